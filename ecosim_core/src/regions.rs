//! Transient area effects: the shared spawn/rasterize/advance/expire lifecycle
//! and the proto-volcano region that drives tectonic uplift.

use bevy::prelude::*;
use rand::Rng;

use crate::{
    config::EcologyParams,
    grid::{DoubleBuffer, GridDims},
    noise::NoiseField,
    params::span,
};

/// A spatially extended influence with a finite lifetime.
pub trait RegionEvent {
    /// Per-tick input to [`RegionEvent::advance`] (drift velocity, nothing, ...).
    type Drive;

    fn center(&self) -> Vec2;

    /// Half extents of the axis-aligned box that contains the footprint.
    fn extent(&self) -> Vec2;

    /// Mask contribution at cell `(x, y)`; zero outside the footprint.
    fn sample(&self, x: f32, y: f32, noise: &NoiseField) -> f32;

    fn advance(&mut self, drive: &Self::Drive);

    fn ttl(&self) -> i32;

    fn is_expired(&self) -> bool {
        self.ttl() <= 0
    }
}

/// Max-blend a region into `mask`. Returns the number of cells touched.
///
/// Degenerate regions are skipped and the bounding box is clamped to the
/// grid. A mask whose length disagrees with `dims` is left untouched.
pub fn rasterize_region<R: RegionEvent>(
    region: &R,
    dims: GridDims,
    noise: &NoiseField,
    mask: &mut [f32],
) -> usize {
    let extent = region.extent();
    if !(extent.x > 0.0 && extent.y > 0.0) || mask.len() != dims.len() {
        return 0;
    }
    let Some((x0, y0, x1, y1)) = dims.clamp_box(region.center(), extent) else {
        return 0;
    };
    let mut touched = 0;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let value = region.sample(x as f32, y as f32, noise);
            if value <= 0.0 {
                continue;
            }
            let Some(idx) = dims.index(x, y) else {
                continue;
            };
            if let Some(cell) = mask.get_mut(idx) {
                *cell = cell.max(value.min(1.0));
                touched += 1;
            }
        }
    }
    touched
}

/// Mean of `mask` over the cells within `radius` of `center`.
pub fn footprint_mean(center: Vec2, radius: f32, dims: GridDims, mask: &[f32]) -> f32 {
    if radius <= 0.0 || mask.len() != dims.len() {
        return 0.0;
    }
    let Some((x0, y0, x1, y1)) = dims.clamp_box(center, Vec2::splat(radius)) else {
        return 0.0;
    };
    let mut sum = 0.0;
    let mut count = 0u32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let d = Vec2::new(x as f32, y as f32).distance(center);
            if d > radius {
                continue;
            }
            if let Some(&value) = dims.index(x, y).and_then(|idx| mask.get(idx)) {
                sum += value;
                count += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Capped probabilistic spawn gate. No random draw is consumed at the cap.
pub fn spawn_roll(active: usize, cap: u32, chance: f32, rng: &mut impl Rng) -> bool {
    if active >= cap as usize {
        return false;
    }
    rng.gen::<f32>() < chance
}

/// Drop expired regions, returning how many were removed.
pub fn compact<R: RegionEvent>(regions: &mut Vec<R>) -> usize {
    let before = regions.len();
    regions.retain(|region| !region.is_expired());
    before - regions.len()
}

/// Continuous rain and volcano influence fields.
#[derive(Resource, Debug, Clone)]
pub struct RegionMasks {
    pub rain: DoubleBuffer<f32>,
    pub volcano: DoubleBuffer<f32>,
}

impl RegionMasks {
    pub fn new(dims: GridDims) -> Self {
        Self {
            rain: DoubleBuffer::new(dims.len(), 0.0),
            volcano: DoubleBuffer::new(dims.len(), 0.0),
        }
    }

    pub fn rain_at(&self, idx: usize) -> f32 {
        self.rain.get(idx).unwrap_or(0.0)
    }

    pub fn volcano_at(&self, idx: usize) -> f32 {
        self.volcano.get(idx).unwrap_or(0.0)
    }
}

/// An uplift-only region that may erupt when its timer runs out.
#[derive(Debug, Clone, PartialEq)]
pub struct VolcanoProtoRegion {
    pub center: Vec2,
    pub radius: f32,
    pub strength: f32,
    pub ttl: i32,
    pub noise_seed: u32,
}

impl VolcanoProtoRegion {
    pub fn spawn(dims: GridDims, params: &EcologyParams, rng: &mut impl Rng) -> Self {
        let (r_min, r_max) = span(params.volcano_radius_min, params.volcano_radius_max);
        let (t_min, t_max) = span(params.volcano_ttl_min, params.volcano_ttl_max);
        Self {
            center: Vec2::new(
                rng.gen_range(0.0..dims.width as f32),
                rng.gen_range(0.0..dims.height as f32),
            ),
            radius: rng.gen_range(r_min..=r_max),
            strength: rng.gen_range(0.6..=1.0),
            ttl: rng.gen_range(t_min..=t_max) as i32,
            noise_seed: rng.gen(),
        }
    }
}

impl RegionEvent for VolcanoProtoRegion {
    type Drive = ();

    fn center(&self) -> Vec2 {
        self.center
    }

    fn extent(&self) -> Vec2 {
        Vec2::splat(self.radius)
    }

    fn sample(&self, x: f32, y: f32, noise: &NoiseField) -> f32 {
        let d = Vec2::new(x, y).distance(self.center) / self.radius;
        if d >= 1.0 {
            return 0.0;
        }
        let falloff = (1.0 - d * d).powi(2);
        let grain = noise.value2(x * 0.2, y * 0.2, self.noise_seed);
        self.strength * falloff * (0.7 + 0.3 * grain)
    }

    fn advance(&mut self, _drive: &()) {
        self.ttl -= 1;
    }

    fn ttl(&self) -> i32 {
        self.ttl
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct VolcanoRegions(pub Vec<VolcanoProtoRegion>);

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn proto(center: Vec2, radius: f32, ttl: i32) -> VolcanoProtoRegion {
        VolcanoProtoRegion {
            center,
            radius,
            strength: 1.0,
            ttl,
            noise_seed: 3,
        }
    }

    #[test]
    fn rasterization_max_blends() {
        let dims = GridDims::new(16, 16);
        let noise = NoiseField::new(1);
        let mut mask = vec![0.0; dims.len()];
        let centre = dims.index(8, 8).unwrap();
        mask[centre] = 0.99;
        let mut region = proto(Vec2::new(8.0, 8.0), 4.0, 5);
        region.strength = 0.5;
        rasterize_region(&region, dims, &noise, &mut mask);
        assert_eq!(mask[centre], 0.99);
        let edge = dims.index(8, 5).unwrap();
        assert!(mask[edge] > 0.0);
        assert_eq!(mask[dims.index(0, 0).unwrap()], 0.0);
    }

    #[test]
    fn degenerate_and_offgrid_regions_are_skipped() {
        let dims = GridDims::new(8, 8);
        let noise = NoiseField::new(1);
        let mut mask = vec![0.0; dims.len()];
        assert_eq!(rasterize_region(&proto(Vec2::new(4.0, 4.0), 0.0, 5), dims, &noise, &mut mask), 0);
        assert_eq!(rasterize_region(&proto(Vec2::new(4.0, 4.0), -3.0, 5), dims, &noise, &mut mask), 0);
        assert_eq!(rasterize_region(&proto(Vec2::new(-40.0, 4.0), 3.0, 5), dims, &noise, &mut mask), 0);
        let touched = rasterize_region(&proto(Vec2::new(-1.0, -1.0), 3.0, 5), dims, &noise, &mut mask);
        assert!(touched > 0);
        assert!(mask.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn mismatched_mask_is_a_no_op() {
        let dims = GridDims::new(8, 8);
        let mut short = vec![0.0; 10];
        let touched = rasterize_region(&proto(Vec2::new(1.0, 1.0), 3.0, 5), dims, &NoiseField::new(1), &mut short);
        assert_eq!(touched, 0);
        assert!(short.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn compaction_drops_expired() {
        let mut regions = vec![proto(Vec2::ZERO, 2.0, 1), proto(Vec2::ZERO, 2.0, 3)];
        regions.iter_mut().for_each(|r| r.advance(&()));
        assert_eq!(compact(&mut regions), 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].ttl, 2);
    }

    #[test]
    fn spawn_respects_cap() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(!spawn_roll(2, 2, 1.0, &mut rng));
        assert!(spawn_roll(1, 2, 1.0, &mut rng));
        assert!(!spawn_roll(0, 2, 0.0, &mut rng));
    }

    #[test]
    fn footprint_mean_averages_disk() {
        let dims = GridDims::new(10, 10);
        let mask = vec![0.5; dims.len()];
        let mean = footprint_mean(Vec2::new(5.0, 5.0), 3.0, dims, &mask);
        assert!((mean - 0.5).abs() < 1e-6);
        assert_eq!(footprint_mean(Vec2::new(5.0, 5.0), 0.0, dims, &mask), 0.0);
    }

    #[test]
    fn spawned_volcano_uses_configured_ranges() {
        let params = EcologyParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..20 {
            let region = VolcanoProtoRegion::spawn(GridDims::new(64, 64), &params, &mut rng);
            assert!(region.radius >= params.volcano_radius_min && region.radius <= params.volcano_radius_max);
            assert!(region.ttl >= params.volcano_ttl_min as i32 && region.ttl <= params.volcano_ttl_max as i32);
        }
    }
}
