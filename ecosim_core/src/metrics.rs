use bevy::prelude::*;
use serde::Serialize;

use crate::{
    cell::{Ground, Vegetation},
    grid::{EcologyGrid, GridDims},
    lava::LavaField,
    rain::COVERAGE_LEVEL,
    resources::PhaseStats,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VegetationCounts {
    pub none: u32,
    pub grass: u32,
    pub shrub: u32,
    pub tree: u32,
}

impl VegetationCounts {
    pub fn vegetated(&self) -> u32 {
        self.grass + self.shrub + self.tree
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroundCounts {
    pub dirt: u32,
    pub rock: u32,
    pub mountain: u32,
    pub lava: u32,
}

/// Sizes of 8-connected vegetated clusters. Bucket `k` counts clusters
/// whose size lies in `[2^k, 2^(k+1))`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterHistogram {
    pub buckets: Vec<u32>,
    pub count: u32,
    pub largest: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RainStats {
    pub coverage: f32,
    pub mean: f32,
    pub peak: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LavaStats {
    pub tiles: u32,
    pub tips: u32,
    pub vents: u32,
    pub injected_total: u64,
    pub advanced: u32,
    pub splits: u32,
    pub pooled: u32,
    pub solidified: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionCounts {
    pub rain: u32,
    pub volcano: u32,
}

/// Snapshot of the world after the most recent tick.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize)]
pub struct EcologyTelemetry {
    pub tick: u64,
    pub vegetation: VegetationCounts,
    pub clusters: ClusterHistogram,
    pub ground: GroundCounts,
    pub burning: u32,
    pub rain: RainStats,
    pub lava: LavaStats,
    pub regions: RegionCounts,
    pub ignitions: u32,
    pub extinguished: u32,
    pub eruptions_triggered: u32,
    pub eruptions_fizzled: u32,
    pub eruptions_total: u64,
}

pub fn vegetation_counts(vegetation: &[Vegetation]) -> VegetationCounts {
    let mut counts = VegetationCounts::default();
    for stage in vegetation {
        match stage {
            Vegetation::None => counts.none += 1,
            Vegetation::Grass => counts.grass += 1,
            Vegetation::Shrub => counts.shrub += 1,
            Vegetation::Tree => counts.tree += 1,
        }
    }
    counts
}

pub fn ground_counts(ground: &[Ground]) -> GroundCounts {
    let mut counts = GroundCounts::default();
    for cell in ground {
        match cell {
            Ground::Dirt => counts.dirt += 1,
            Ground::Rock => counts.rock += 1,
            Ground::Mountain => counts.mountain += 1,
            Ground::Lava => counts.lava += 1,
        }
    }
    counts
}

pub fn cluster_histogram(vegetation: &[Vegetation], dims: GridDims) -> ClusterHistogram {
    let mut histogram = ClusterHistogram::default();
    if vegetation.len() != dims.len() {
        return histogram;
    }
    let mut visited = vec![false; vegetation.len()];
    let mut stack = Vec::new();
    for start in 0..vegetation.len() {
        if visited[start] || !vegetation[start].is_vegetated() {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut size = 0u32;
        while let Some(idx) = stack.pop() {
            size += 1;
            for (_, n) in dims.neighbors(idx) {
                if !visited[n] && vegetation[n].is_vegetated() {
                    visited[n] = true;
                    stack.push(n);
                }
            }
        }
        let bucket = (u32::BITS - 1 - size.leading_zeros()) as usize;
        if histogram.buckets.len() <= bucket {
            histogram.buckets.resize(bucket + 1, 0);
        }
        histogram.buckets[bucket] += 1;
        histogram.count += 1;
        histogram.largest = histogram.largest.max(size);
    }
    histogram
}

pub fn rain_stats(mask: &[f32]) -> RainStats {
    if mask.is_empty() {
        return RainStats::default();
    }
    let mut covered = 0u32;
    let mut sum = 0.0f64;
    let mut peak = 0.0f32;
    for &value in mask {
        if value >= COVERAGE_LEVEL {
            covered += 1;
        }
        sum += value as f64;
        peak = peak.max(value);
    }
    RainStats {
        coverage: covered as f32 / mask.len() as f32,
        mean: (sum / mask.len() as f64) as f32,
        peak,
    }
}

/// Rebuild the telemetry snapshot from the live state.
pub fn capture(
    telemetry: &mut EcologyTelemetry,
    tick: u64,
    grid: &EcologyGrid,
    lava: &LavaField,
    rain_mask: &[f32],
    regions: RegionCounts,
    stats: &PhaseStats,
) {
    telemetry.tick = tick;
    telemetry.vegetation = vegetation_counts(grid.vegetation.current());
    telemetry.clusters = cluster_histogram(grid.vegetation.current(), grid.dims);
    telemetry.ground = ground_counts(grid.ground.current());
    telemetry.burning = grid.burn_ttl.current().iter().filter(|ttl| **ttl > 0).count() as u32;
    telemetry.rain = rain_stats(rain_mask);
    telemetry.lava = LavaStats {
        tiles: lava.lava_tiles() as u32,
        tips: lava.tip_count() as u32,
        vents: lava.vents.len() as u32,
        injected_total: lava.injected_total,
        advanced: stats.lava_advanced,
        splits: stats.lava_splits,
        pooled: stats.lava_pooled,
        solidified: stats.lava_solidified,
    };
    telemetry.regions = regions;
    telemetry.ignitions = stats.ignitions;
    telemetry.extinguished = stats.extinguished;
    telemetry.eruptions_triggered = stats.eruptions_triggered;
    telemetry.eruptions_fizzled = stats.eruptions_fizzled;
    telemetry.eruptions_total += stats.eruptions_triggered as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clusters_use_eight_connectivity() {
        let dims = GridDims::new(5, 5);
        let mut vegetation = vec![Vegetation::None; dims.len()];
        for (x, y) in [(0, 0), (1, 1), (2, 2), (4, 0), (4, 4), (3, 4), (4, 3), (3, 3)] {
            vegetation[dims.index(x, y).unwrap()] = Vegetation::Grass;
        }
        let histogram = cluster_histogram(&vegetation, dims);
        assert_eq!(histogram.count, 2);
        assert_eq!(histogram.largest, 7);
        assert_eq!(histogram.buckets, vec![1, 0, 1]);
    }

    #[test]
    fn counts_cover_every_cell() {
        let vegetation = [Vegetation::None, Vegetation::Tree, Vegetation::Tree, Vegetation::Shrub];
        let counts = vegetation_counts(&vegetation);
        assert_eq!(counts.tree, 2);
        assert_eq!(counts.vegetated(), 3);
        let ground = ground_counts(&[Ground::Lava, Ground::Rock, Ground::Rock]);
        assert_eq!(ground.rock, 2);
        assert_eq!(ground.lava, 1);
    }

    #[test]
    fn rain_stats_summarise_mask() {
        let stats = rain_stats(&[0.0, 0.05, 0.5, 1.0]);
        assert_eq!(stats.coverage, 0.5);
        assert_eq!(stats.peak, 1.0);
        assert!((stats.mean - 0.3875).abs() < 1e-6);
        assert_eq!(rain_stats(&[]), RainStats::default());
    }
}
