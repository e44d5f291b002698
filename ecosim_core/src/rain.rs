//! Drifting rain clouds: spawning with coverage back-pressure, curl-noise
//! drift with cohesion, pairwise merging, noise-textured rasterization and
//! morphological cleanup of the rasterized mask.

use std::f32::consts::PI;

use bevy::prelude::*;
use rand::Rng;
use serde::Serialize;

use crate::{
    config::EcologyParams,
    grid::GridDims,
    noise::{smoothstep, NoiseField},
    params::span,
    regions::{compact, spawn_roll, RegionEvent},
};

const RAIN_FLOW_SALT: u32 = 0x5A1F;
const STRENGTH_EASE: f32 = 0.05;
const VELOCITY_BLEND: f32 = 0.2;
const MERGE_COOLDOWN: u32 = 20;
const MERGE_STRENGTH_GAIN: f32 = 0.1;
/// Cells at or above this value count towards rain coverage.
pub const COVERAGE_LEVEL: f32 = 0.1;
const ISLAND_LEVEL: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RainPreset {
    Puffy,
    Stratus,
    Squall,
}

#[derive(Debug, Clone, Copy)]
struct PresetShape {
    aspect: (f32, f32),
    falloff: f32,
    threshold_bias: f32,
    strength: (f32, f32),
    ttl_scale: f32,
    drift_scale: f32,
}

impl RainPreset {
    fn shape(self) -> PresetShape {
        match self {
            RainPreset::Puffy => PresetShape {
                aspect: (1.0, 1.3),
                falloff: 1.6,
                threshold_bias: 0.0,
                strength: (0.55, 0.8),
                ttl_scale: 1.0,
                drift_scale: 1.0,
            },
            RainPreset::Stratus => PresetShape {
                aspect: (1.8, 2.6),
                falloff: 1.0,
                threshold_bias: -0.08,
                strength: (0.35, 0.55),
                ttl_scale: 1.5,
                drift_scale: 0.6,
            },
            RainPreset::Squall => PresetShape {
                aspect: (1.0, 1.5),
                falloff: 2.4,
                threshold_bias: 0.05,
                strength: (0.85, 1.0),
                ttl_scale: 0.5,
                drift_scale: 1.6,
            },
        }
    }

    fn pick(rng: &mut impl Rng) -> Self {
        let roll: f32 = rng.gen();
        if roll < 0.5 {
            RainPreset::Puffy
        } else if roll < 0.8 {
            RainPreset::Stratus
        } else {
            RainPreset::Squall
        }
    }
}

/// Texture settings read from the live parameters each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainShape {
    pub core_radius: f32,
    pub noise_scale: f32,
    pub noise_threshold: f32,
    pub noise_softness: f32,
    pub fade_ticks: u32,
}

impl RainShape {
    pub fn from_params(params: &EcologyParams) -> Self {
        Self {
            core_radius: params.rain_core_radius,
            noise_scale: params.rain_noise_scale,
            noise_threshold: params.rain_noise_threshold,
            noise_softness: params.rain_noise_softness,
            fade_ticks: params.rain_fade_ticks,
        }
    }
}

pub struct RainDrive {
    pub velocity: Vec2,
    pub shape: RainShape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RainRegion {
    pub center: Vec2,
    pub radii: Vec2,
    pub strength: f32,
    pub target_strength: f32,
    pub age: u32,
    pub ttl: i32,
    pub max_ttl: i32,
    pub velocity: Vec2,
    pub falloff: f32,
    pub noise_seed: u32,
    pub noise_offset: Vec2,
    pub preset: RainPreset,
    pub merge_cooldown: u32,
    pub shape: RainShape,
}

impl RainRegion {
    pub fn spawn(dims: GridDims, params: &EcologyParams, rng: &mut impl Rng) -> Self {
        let preset = RainPreset::pick(rng);
        let shape = preset.shape();
        let (r_min, r_max) = span(params.rain_radius_min, params.rain_radius_max);
        let (t_min, t_max) = span(params.rain_ttl_min, params.rain_ttl_max);
        let radius = rng.gen_range(r_min..=r_max);
        let aspect = rng.gen_range(shape.aspect.0..=shape.aspect.1).sqrt();
        let radii = if rng.gen_bool(0.5) {
            Vec2::new(radius * aspect, radius / aspect)
        } else {
            Vec2::new(radius / aspect, radius * aspect)
        };
        let ttl = ((rng.gen_range(t_min..=t_max) as f32) * shape.ttl_scale).round().max(1.0) as i32;
        let strength = rng.gen_range(shape.strength.0..=shape.strength.1);
        Self {
            center: Vec2::new(
                rng.gen_range(0.0..dims.width as f32),
                rng.gen_range(0.0..dims.height as f32),
            ),
            radii,
            strength,
            target_strength: strength,
            age: 0,
            ttl,
            max_ttl: ttl,
            velocity: Vec2::ZERO,
            falloff: shape.falloff,
            noise_seed: rng.gen(),
            noise_offset: Vec2::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)),
            preset,
            merge_cooldown: 0,
            shape: RainShape::from_params(params),
        }
    }

    /// Radius of the circle with the same area as the ellipse.
    pub fn equal_area_radius(&self) -> f32 {
        (self.radii.x * self.radii.y).max(0.0).sqrt()
    }

    pub fn area(&self) -> f32 {
        PI * self.radii.x * self.radii.y
    }

    /// Strength after the spawn fade-in and expiry fade-out.
    pub fn effective_strength(&self) -> f32 {
        let fade = self.shape.fade_ticks as f32;
        if fade <= 0.0 {
            return self.strength;
        }
        let fade_in = ((self.age + 1) as f32 / fade).min(1.0);
        let fade_out = (self.ttl.max(0) as f32 / fade).min(1.0);
        self.strength * fade_in.min(fade_out)
    }

    fn threshold(&self) -> f32 {
        (self.shape.noise_threshold + self.preset.shape().threshold_bias).clamp(0.0, 1.0)
    }

    fn drift_scale(&self) -> f32 {
        self.preset.shape().drift_scale
    }

    fn overlaps_grid(&self, dims: GridDims) -> bool {
        let min = self.center - self.radii;
        let max = self.center + self.radii;
        max.x >= 0.0 && max.y >= 0.0 && min.x < dims.width as f32 && min.y < dims.height as f32
    }
}

impl RegionEvent for RainRegion {
    type Drive = RainDrive;

    fn center(&self) -> Vec2 {
        self.center
    }

    fn extent(&self) -> Vec2 {
        self.radii
    }

    fn sample(&self, x: f32, y: f32, noise: &NoiseField) -> f32 {
        if self.radii.x <= 0.0 || self.radii.y <= 0.0 {
            return 0.0;
        }
        let local = (Vec2::new(x, y) - self.center) / self.radii;
        let r = local.length();
        if r >= 1.0 {
            return 0.0;
        }
        let strength = self.effective_strength();
        let core = self.shape.core_radius;
        if r <= core {
            return strength;
        }
        let t = (r - core) / (1.0 - core);
        let radial = (1.0 - t).powf(self.falloff);
        let p = (Vec2::new(x, y) + self.noise_offset) * self.shape.noise_scale;
        let n = noise.fbm2(p.x, p.y, 3, self.noise_seed);
        let threshold = self.threshold();
        let softness = self.shape.noise_softness;
        let gate = smoothstep(threshold - softness, threshold + softness, n);
        let textured = 1.0 + (gate - 1.0) * smoothstep(0.0, 1.0, t);
        strength * radial * textured
    }

    fn advance(&mut self, drive: &RainDrive) {
        self.shape = drive.shape;
        self.velocity = drive.velocity;
        self.center += self.velocity;
        self.noise_offset += self.velocity * 0.5;
        self.strength += (self.target_strength - self.strength) * STRENGTH_EASE;
        self.age = self.age.saturating_add(1);
        self.ttl -= 1;
        self.merge_cooldown = self.merge_cooldown.saturating_sub(1);
    }

    fn ttl(&self) -> i32 {
        self.ttl
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct RainRegions(pub Vec<RainRegion>);

/// Per-region drift for this tick: curl flow rotated by a slow phase,
/// averaged with nearby clouds, eased from last tick and clamped.
pub fn drift_velocities(
    regions: &[RainRegion],
    noise: &NoiseField,
    params: &EcologyParams,
    tick: u64,
) -> Vec<Vec2> {
    let z = tick as f32 * params.rain_phase_rate;
    let phase = Vec2::from_angle(z);
    let flow: Vec<Vec2> = regions
        .iter()
        .map(|region| {
            let p = region.center * params.rain_flow_scale;
            phase.rotate(noise.curl(p.x, p.y, z, RAIN_FLOW_SALT)) * region.drift_scale()
        })
        .collect();

    let radius_sq = params.rain_cohesion_radius * params.rain_cohesion_radius;
    regions
        .iter()
        .enumerate()
        .map(|(i, region)| {
            let mut sum = Vec2::ZERO;
            let mut count = 0;
            for (j, other) in regions.iter().enumerate() {
                if region.center.distance_squared(other.center) <= radius_sq {
                    sum += flow[j];
                    count += 1;
                }
            }
            let neighbourhood = if count > 0 { sum / count as f32 } else { flow[i] };
            let target = flow[i].lerp(neighbourhood, params.rain_cohesion);
            region
                .velocity
                .lerp(target, VELOCITY_BLEND)
                .clamp_length_max(params.rain_max_drift)
        })
        .collect()
}

/// Area of the lens where two circles overlap.
pub fn circle_overlap(r0: f32, r1: f32, d: f32) -> f32 {
    if r0 <= 0.0 || r1 <= 0.0 || d >= r0 + r1 {
        return 0.0;
    }
    if d <= (r0 - r1).abs() {
        let r = r0.min(r1);
        return PI * r * r;
    }
    let a0 = ((d * d + r0 * r0 - r1 * r1) / (2.0 * d * r0)).clamp(-1.0, 1.0).acos();
    let a1 = ((d * d + r1 * r1 - r0 * r0) / (2.0 * d * r1)).clamp(-1.0, 1.0).acos();
    let k = ((-d + r0 + r1) * (d + r0 - r1) * (d - r0 + r1) * (d + r0 + r1)).max(0.0);
    r0 * r0 * a0 + r1 * r1 * a1 - 0.5 * k.sqrt()
}

fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert!(i < j);
    let (head, tail) = items.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

/// Merge cloud pairs whose overlap covers enough of the smaller one.
pub fn merge_overlapping(regions: &mut [RainRegion], params: &EcologyParams) -> u32 {
    let mut merges = 0;
    for i in 0..regions.len() {
        for j in (i + 1)..regions.len() {
            let (a, b) = pair_mut(regions, i, j);
            if a.merge_cooldown > 0 || b.merge_cooldown > 0 || a.is_expired() || b.is_expired() {
                continue;
            }
            let ra = a.equal_area_radius();
            let rb = b.equal_area_radius();
            let overlap = circle_overlap(ra, rb, a.center.distance(b.center));
            let smaller_area = PI * ra.min(rb).powi(2);
            if smaller_area <= 0.0 || overlap / smaller_area < params.rain_merge_overlap {
                continue;
            }
            let (big, small) = if a.area() >= b.area() { (a, b) } else { (b, a) };
            absorb(big, small, params.rain_fade_ticks);
            merges += 1;
            tracing::debug!(
                target: "ecosim::regions",
                x = big.center.x,
                y = big.center.y,
                "rain.merged"
            );
        }
    }
    merges
}

fn absorb(big: &mut RainRegion, small: &mut RainRegion, fade_ticks: u32) {
    let big_area = big.area();
    let small_area = small.area();
    big.strength = (big.strength + MERGE_STRENGTH_GAIN).min(1.0);
    big.target_strength = (big.target_strength + MERGE_STRENGTH_GAIN).min(1.0);
    if big_area > 0.0 {
        let grow = ((big_area + 0.5 * small_area) / big_area).sqrt();
        big.radii *= grow;
    }
    let pull = small_area / (big_area + small_area).max(f32::EPSILON) * 0.5;
    big.center += (small.center - big.center) * pull;

    small.radii *= 0.7;
    small.strength *= 0.6;
    small.target_strength *= 0.6;
    small.ttl = small.ttl.min(fade_ticks.max(1) as i32);

    big.merge_cooldown = MERGE_COOLDOWN;
    small.merge_cooldown = MERGE_COOLDOWN;
}

/// Fraction of cells whose rain value is at least [`COVERAGE_LEVEL`].
pub fn coverage(mask: &[f32]) -> f32 {
    if mask.is_empty() {
        return 0.0;
    }
    mask.iter().filter(|v| **v >= COVERAGE_LEVEL).count() as f32 / mask.len() as f32
}

/// Roll for a new cloud. Past the soft cap, spawns are skipped with a
/// probability that grows with the excess coverage.
pub fn try_spawn_rain(
    regions: &mut Vec<RainRegion>,
    dims: GridDims,
    params: &EcologyParams,
    current_coverage: f32,
    rng: &mut impl Rng,
) -> bool {
    if !spawn_roll(regions.len(), params.rain_max_regions, params.rain_spawn_chance, rng) {
        return false;
    }
    let cap = params.rain_coverage_soft_cap;
    if current_coverage > cap {
        let skip = if cap > 0.0 {
            ((current_coverage - cap) / (2.0 * cap)).clamp(0.0, 1.0)
        } else {
            1.0
        };
        if rng.gen::<f32>() < skip {
            return false;
        }
    }
    let region = RainRegion::spawn(dims, params, rng);
    tracing::debug!(
        target: "ecosim::regions",
        preset = ?region.preset,
        x = region.center.x,
        y = region.center.y,
        ttl = region.ttl,
        "rain.spawned"
    );
    regions.push(region);
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RainAdvance {
    pub merged: u32,
    pub expired: usize,
}

/// Drift, age and merge every cloud, then drop the expired ones.
pub fn advance_rain(
    regions: &mut Vec<RainRegion>,
    dims: GridDims,
    noise: &NoiseField,
    params: &EcologyParams,
    tick: u64,
) -> RainAdvance {
    let velocities = drift_velocities(regions, noise, params, tick);
    let shape = RainShape::from_params(params);
    for (region, velocity) in regions.iter_mut().zip(velocities) {
        region.advance(&RainDrive { velocity, shape });
        if !region.overlaps_grid(dims) {
            region.ttl = 0;
        }
    }
    let merged = merge_overlapping(regions, params);
    let expired = compact(regions);
    RainAdvance { merged, expired }
}

fn neighbourhood_fold(src: &[f32], dims: GridDims, pick: fn(f32, f32) -> f32) -> Vec<f32> {
    let mut out = src.to_vec();
    for (idx, slot) in out.iter_mut().enumerate() {
        *slot = dims
            .neighbors(idx)
            .filter_map(|(_, n)| src.get(n).copied())
            .fold(src[idx], pick);
    }
    out
}

pub fn dilate(src: &[f32], dims: GridDims) -> Vec<f32> {
    neighbourhood_fold(src, dims, f32::max)
}

pub fn erode(src: &[f32], dims: GridDims) -> Vec<f32> {
    neighbourhood_fold(src, dims, f32::min)
}

/// Zero every 8-connected component above `level` smaller than `min_area`.
pub fn remove_small_islands(mask: &mut [f32], dims: GridDims, level: f32, min_area: u32) -> u32 {
    if mask.len() != dims.len() || min_area == 0 {
        return 0;
    }
    let mut visited = vec![false; mask.len()];
    let mut stack = Vec::new();
    let mut component = Vec::new();
    let mut removed = 0;
    for start in 0..mask.len() {
        if visited[start] || mask[start] <= level {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        component.clear();
        while let Some(idx) = stack.pop() {
            component.push(idx);
            for (_, n) in dims.neighbors(idx) {
                if !visited[n] && mask[n] > level {
                    visited[n] = true;
                    stack.push(n);
                }
            }
        }
        if component.len() < min_area as usize {
            for &idx in &component {
                mask[idx] = 0.0;
            }
            removed += 1;
        }
    }
    removed
}

/// Closing fills pinholes, opening removes spray, then tiny islands go.
pub fn clean_rain_mask(mask: &mut [f32], dims: GridDims, min_area: u32) {
    if mask.len() != dims.len() {
        return;
    }
    let closed = erode(&dilate(mask, dims), dims);
    let opened = dilate(&erode(&closed, dims), dims);
    mask.copy_from_slice(&opened);
    remove_small_islands(mask, dims, ISLAND_LEVEL, min_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::rasterize_region;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cloud(center: Vec2, radius: f32) -> RainRegion {
        RainRegion {
            center,
            radii: Vec2::splat(radius),
            strength: 0.5,
            target_strength: 0.5,
            age: 100,
            ttl: 100,
            max_ttl: 200,
            velocity: Vec2::ZERO,
            falloff: 1.5,
            noise_seed: 7,
            noise_offset: Vec2::ZERO,
            preset: RainPreset::Puffy,
            merge_cooldown: 0,
            shape: RainShape::from_params(&EcologyParams::default()),
        }
    }

    #[test]
    fn core_is_fully_opaque_and_edge_is_empty() {
        let noise = NoiseField::new(2);
        let region = cloud(Vec2::new(20.0, 20.0), 10.0);
        assert_eq!(region.sample(20.0, 20.0, &noise), 0.5);
        assert_eq!(region.sample(22.0, 20.0, &noise), 0.5);
        assert_eq!(region.sample(30.0, 20.0, &noise), 0.0);
        assert_eq!(region.sample(40.0, 40.0, &noise), 0.0);
    }

    #[test]
    fn strength_fades_in_and_out() {
        let mut region = cloud(Vec2::ZERO, 5.0);
        region.age = 0;
        let fade = region.shape.fade_ticks as f32;
        assert!((region.effective_strength() - 0.5 / fade).abs() < 1e-6);
        region.age = 500;
        region.ttl = 3;
        assert!((region.effective_strength() - 0.5 * 3.0 / fade).abs() < 1e-6);
        region.ttl = 0;
        assert_eq!(region.effective_strength(), 0.0);
    }

    #[test]
    fn overlapping_clouds_merge_once() {
        let params = EcologyParams::default();
        let mut regions = vec![cloud(Vec2::new(20.0, 20.0), 10.0), cloud(Vec2::new(24.0, 20.0), 6.0)];
        assert_eq!(merge_overlapping(&mut regions, &params), 1);
        let (big, small) = (&regions[0], &regions[1]);
        assert!((big.strength - 0.6).abs() < 1e-6);
        assert!(big.radii.x > 10.0);
        assert!(big.center.x > 20.0);
        assert!((small.radii.x - 4.2).abs() < 1e-5);
        assert!((small.strength - 0.3).abs() < 1e-6);
        assert!(small.ttl <= params.rain_fade_ticks as i32);
        assert_eq!(merge_overlapping(&mut regions, &params), 0);
    }

    #[test]
    fn distant_clouds_do_not_merge() {
        let params = EcologyParams::default();
        let mut regions = vec![cloud(Vec2::new(10.0, 10.0), 5.0), cloud(Vec2::new(40.0, 10.0), 5.0)];
        assert_eq!(merge_overlapping(&mut regions, &params), 0);
    }

    #[test]
    fn lens_area_limits() {
        assert_eq!(circle_overlap(2.0, 2.0, 5.0), 0.0);
        assert!((circle_overlap(5.0, 2.0, 1.0) - PI * 4.0).abs() < 1e-4);
        let half = circle_overlap(3.0, 3.0, 3.0);
        assert!(half > 0.0 && half < PI * 9.0);
        assert!((circle_overlap(3.0, 4.0, 5.0) - circle_overlap(4.0, 3.0, 5.0)).abs() < 1e-4);
    }

    #[test]
    fn drift_is_clamped() {
        let params = EcologyParams::default();
        let noise = NoiseField::new(3);
        let mut regions: Vec<RainRegion> = (0..5)
            .map(|i| cloud(Vec2::new(10.0 + 13.0 * i as f32, 30.0), 8.0))
            .collect();
        for tick in 0..50 {
            let velocities = drift_velocities(&regions, &noise, &params, tick);
            for (region, v) in regions.iter_mut().zip(velocities) {
                assert!(v.length() <= params.rain_max_drift + 1e-5);
                region.velocity = v;
            }
        }
        assert!(regions.iter().any(|r| r.velocity.length() > 0.0));
    }

    #[test]
    fn clouds_leaving_the_grid_expire() {
        let params = EcologyParams::default();
        let dims = GridDims::new(32, 32);
        let mut regions = vec![cloud(Vec2::new(-20.0, 16.0), 4.0), cloud(Vec2::new(16.0, 16.0), 4.0)];
        let outcome = advance_rain(&mut regions, dims, &NoiseField::new(1), &params, 0);
        assert_eq!(outcome.expired, 1);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn saturated_coverage_blocks_spawning() {
        let mut params = EcologyParams::default();
        params.rain_spawn_chance = 1.0;
        let dims = GridDims::new(32, 32);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut regions = Vec::new();
        for _ in 0..20 {
            assert!(!try_spawn_rain(&mut regions, dims, &params, 1.0, &mut rng));
        }
        assert!(try_spawn_rain(&mut regions, dims, &params, 0.0, &mut rng));
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn closing_fills_pinholes() {
        let dims = GridDims::new(10, 10);
        let mut mask = vec![0.8; dims.len()];
        let hole = dims.index(5, 5).unwrap();
        mask[hole] = 0.0;
        clean_rain_mask(&mut mask, dims, 4);
        assert_eq!(mask[hole], 0.8);
    }

    #[test]
    fn opening_removes_spray() {
        let dims = GridDims::new(10, 10);
        let mut mask = vec![0.0; dims.len()];
        mask[dims.index(4, 4).unwrap()] = 0.9;
        clean_rain_mask(&mut mask, dims, 0);
        assert!(mask.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn small_islands_are_removed() {
        let dims = GridDims::new(12, 12);
        let block = |mask: &mut Vec<f32>| {
            for y in 4..8 {
                for x in 4..8 {
                    mask[dims.index(x, y).unwrap()] = 0.6;
                }
            }
        };
        let mut kept = vec![0.0; dims.len()];
        block(&mut kept);
        clean_rain_mask(&mut kept, dims, 12);
        assert_eq!(kept.iter().filter(|v| **v > 0.0).count(), 16);

        let mut dropped = vec![0.0; dims.len()];
        block(&mut dropped);
        clean_rain_mask(&mut dropped, dims, 20);
        assert!(dropped.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn rasterized_cloud_stays_in_unit_range() {
        let dims = GridDims::new(48, 48);
        let noise = NoiseField::new(4);
        let params = EcologyParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut mask = vec![0.0; dims.len()];
        for _ in 0..6 {
            let mut region = RainRegion::spawn(dims, &params, &mut rng);
            region.age = 200;
            rasterize_region(&region, dims, &noise, &mut mask);
        }
        assert!(mask.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(coverage(&mask) > 0.0);
    }
}
