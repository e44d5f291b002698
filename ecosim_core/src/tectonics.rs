//! Mask-driven uplift and eruptions: caldera seeding, rim raising,
//! volcanic cone elevation and vent placement.

use bevy::prelude::*;
use rand::Rng;

use crate::{
    cell::{Direction, Ground, Vegetation},
    config::EcologyParams,
    grid::EcologyGrid,
    lava::{terrain_elevation, LavaField, LavaVent},
    params::span,
    resources::PendingEruption,
};

/// Molten core, as a fraction of the eruption radius.
pub const CORE_FRACTION: f32 = 0.35;
/// Outer edge of the raised rim, as a fraction of the eruption radius.
pub const RIM_FRACTION: f32 = 0.9;

/// Convert rock under the volcano mask into mountain. Returns cells uplifted.
pub fn apply_uplift(
    grid: &mut EcologyGrid,
    volcano_mask: &[f32],
    params: &EcologyParams,
    rng: &mut impl Rng,
) -> u32 {
    grid.ground.begin();
    let mut uplifted = 0;
    let (current, next) = grid.ground.split();
    for (idx, ground) in current.iter().enumerate() {
        let mask = volcano_mask.get(idx).copied().unwrap_or(0.0);
        if *ground != Ground::Rock || mask <= 0.0 {
            continue;
        }
        let chance = (params.uplift_base * mask).min(1.0);
        if rng.gen::<f32>() < chance {
            next[idx] = Ground::Mountain;
            uplifted += 1;
        }
    }
    grid.ground.swap();
    uplifted
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EruptionOutcome {
    pub core_cells: u32,
    pub rim_cells: u32,
    pub vents: u32,
}

/// Erupt at `center`: clear the footprint, raise a cone, seed a molten
/// core, push up a mountain rim and open vents.
///
/// Works on the live buffers; it runs between phases, never inside one.
pub fn erupt(
    center: Vec2,
    radius: f32,
    grid: &mut EcologyGrid,
    lava: &mut LavaField,
    params: &EcologyParams,
    rng: &mut impl Rng,
) -> EruptionOutcome {
    let mut outcome = EruptionOutcome::default();
    let dims = grid.dims;
    if lava.len() != grid.len() || dims.is_empty() {
        return outcome;
    }
    let radius = radius.max(1.0);
    let core_radius = radius * CORE_FRACTION;
    let rim_radius = radius * RIM_FRACTION;
    let reach = radius * params.elevation_reach;
    let distance = |idx: usize| {
        let (x, y) = dims.coords(idx);
        Vec2::new(x as f32, y as f32).distance(center)
    };

    let Some((x0, y0, x1, y1)) = dims.clamp_box(center, Vec2::splat(reach.max(radius))) else {
        return outcome;
    };
    let cells: Vec<usize> = (y0..=y1)
        .flat_map(|y| (x0..=x1).filter_map(move |x| dims.index(x, y)))
        .collect();

    for &idx in &cells {
        if distance(idx) <= radius {
            lava.clear_live(grid, idx);
        }
    }
    lava.vents
        .retain(|vent| distance(vent.source) > radius && distance(vent.outlet) > radius);

    for &idx in &cells {
        let d = distance(idx);
        if d >= reach {
            continue;
        }
        let ground = grid.ground.current()[idx];
        let tectonic = grid.tectonic_baseline.get(idx).copied().unwrap_or(0.0);
        let jitter = if params.elevation_jitter > 0 {
            rng.gen_range(0..=params.elevation_jitter) as i16
        } else {
            0
        };
        let cone = (params.elevation_slope * (reach - d)).round() as i16;
        lava.elevation[idx] = terrain_elevation(ground, tectonic)
            .saturating_add(jitter)
            .saturating_add(cone);
    }

    let mut is_core = vec![false; dims.len()];
    let mut core = Vec::new();
    for &idx in &cells {
        let d = distance(idx);
        if d <= core_radius {
            is_core[idx] = true;
            core.push(idx);
        } else if d <= rim_radius {
            grid.ground.write_current(idx, Ground::Mountain);
            grid.vegetation.write_current(idx, Vegetation::None);
            grid.burn_ttl.write_current(idx, 0);
            outcome.rim_cells += 1;
        }
    }
    if core.is_empty() {
        let nearest = dims.index(center.x.round() as i32, center.y.round() as i32);
        if let Some(idx) = nearest {
            is_core[idx] = true;
            core.push(idx);
        }
    }

    for &idx in &core {
        let height = rng.gen_range(2..=3u8);
        let heading = lava.downhill(idx);
        lava.place_live(grid, idx, height, 1.0, heading);
        grid.vegetation.write_current(idx, Vegetation::None);
        grid.burn_ttl.write_current(idx, 0);
        outcome.core_cells += 1;
    }
    if core.is_empty() {
        return outcome;
    }

    let (count_min, count_max) = span(params.vent_count_min, params.vent_count_max);
    let (mass_min, mass_max) = span(params.vent_mass_min, params.vent_mass_max);
    let count = rng.gen_range(count_min..=count_max);
    for _ in 0..count {
        let source = core[rng.gen_range(0..core.len())];
        let heading = lava.downhill(source);
        let Some(outlet) = find_outlet(lava, source, heading, &is_core) else {
            continue;
        };
        let mass = rng.gen_range(mass_min..=mass_max);
        lava.vents
            .push(LavaVent::new(source, outlet, heading, mass, params.vent_gain));
        outcome.vents += 1;
    }
    outcome
}

/// First non-core cell along the heading, or along the least-uphill
/// neighbour when the source is a local minimum.
fn find_outlet(
    lava: &LavaField,
    source: usize,
    heading: Option<Direction>,
    is_core: &[bool],
) -> Option<usize> {
    let dims = lava.dims;
    let least_uphill = || {
        dims.neighbors(source)
            .min_by_key(|(_, n)| (is_core.get(*n).copied().unwrap_or(false), lava.elevation_at(*n)))
    };
    let dir = heading.or_else(|| least_uphill().map(|(dir, _)| dir))?;
    let mut cursor = source;
    while let Some(next) = dims.step(cursor, dir) {
        if !is_core.get(next).copied().unwrap_or(false) {
            return Some(next);
        }
        cursor = next;
    }
    least_uphill().map(|(_, n)| n)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EruptionTally {
    pub triggered: u32,
    pub fizzled: u32,
}

/// Roll every queued proto-volcano for eruption and drain the queue.
pub fn resolve_eruptions(
    queue: &mut Vec<PendingEruption>,
    grid: &mut EcologyGrid,
    lava: &mut LavaField,
    params: &EcologyParams,
    rng: &mut impl Rng,
) -> EruptionTally {
    let mut tally = EruptionTally::default();
    for pending in queue.drain(..) {
        let chance = (params.erupt_base * pending.mean_mask).clamp(0.0, 1.0);
        if rng.gen::<f32>() < chance {
            let outcome = erupt(pending.center, pending.radius, grid, lava, params, rng);
            tally.triggered += 1;
            tracing::info!(
                target: "ecosim::tectonics",
                x = pending.center.x,
                y = pending.center.y,
                radius = pending.radius,
                vents = outcome.vents,
                "eruption.triggered"
            );
        } else {
            tally.fizzled += 1;
            tracing::debug!(
                target: "ecosim::tectonics",
                mean_mask = pending.mean_mask,
                "eruption.fizzled"
            );
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDims;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rock_world(size: u32) -> (EcologyGrid, LavaField) {
        let dims = GridDims::new(size, size);
        let mut grid = EcologyGrid::new(dims);
        grid.fill_ground(Ground::Rock);
        let mut lava = LavaField::new(dims);
        lava.reset_elevation(&grid);
        (grid, lava)
    }

    #[test]
    fn uplift_only_touches_masked_rock() {
        let (mut grid, _) = rock_world(8);
        let dirt = grid.dims.index(0, 0).unwrap();
        grid.ground.write_current(dirt, Ground::Dirt);
        let mut mask = vec![1.0; grid.len()];
        let dry = grid.dims.index(7, 7).unwrap();
        mask[dry] = 0.0;
        let mut params = EcologyParams::default();
        params.uplift_base = 1.0;
        let uplifted = apply_uplift(&mut grid, &mask, &params, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(uplifted as usize, grid.len() - 2);
        assert_eq!(grid.ground.current()[dirt], Ground::Dirt);
        assert_eq!(grid.ground.current()[dry], Ground::Rock);
        assert_eq!(grid.ground.current()[9], Ground::Mountain);
    }

    #[test]
    fn eruption_builds_core_rim_and_vents() {
        let (mut grid, mut lava) = rock_world(48);
        let params = EcologyParams::default();
        let center = Vec2::new(24.0, 24.0);
        let radius = 8.0;
        let outcome = erupt(center, radius, &mut grid, &mut lava, &params, &mut ChaCha8Rng::seed_from_u64(2));
        assert!(outcome.core_cells > 0);
        assert!(outcome.rim_cells > 0);
        assert!((params.vent_count_min..=params.vent_count_max).contains(&outcome.vents));
        assert_eq!(lava.vents.len() as u32, outcome.vents);

        let dims = grid.dims;
        let apex = dims.index(24, 24).unwrap();
        assert!((2..=3).contains(&lava.height.current()[apex]));
        assert_eq!(lava.temperature.current()[apex], 1.0);
        assert_eq!(grid.ground.current()[dims.index(24, 30).unwrap()], Ground::Mountain);
        assert!(lava.elevation_at(apex) > lava.elevation_at(dims.index(24, 46).unwrap()));

        for vent in &lava.vents {
            let (ox, oy) = dims.coords(vent.outlet);
            let d = Vec2::new(ox as f32, oy as f32).distance(center);
            assert!(d > radius * CORE_FRACTION);
            assert!((params.vent_mass_min..=params.vent_mass_max).contains(&vent.mass));
            assert!(lava.is_lava(vent.source));
        }
        assert!(grid
            .ground
            .current()
            .iter()
            .zip(lava.height.current())
            .all(|(g, h)| (*g == Ground::Lava) == (*h > 0)));
    }

    #[test]
    fn flat_vent_still_gets_an_outlet() {
        let (mut grid, mut lava) = rock_world(32);
        let mut params = EcologyParams::default();
        params.elevation_slope = 0.0;
        params.elevation_jitter = 0;
        params.vent_count_min = 3;
        params.vent_count_max = 3;
        let outcome = erupt(Vec2::new(16.0, 16.0), 8.0, &mut grid, &mut lava, &params, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(outcome.vents, 3);
        for vent in &lava.vents {
            assert_eq!(vent.heading, None);
            assert_ne!(vent.outlet, vent.source);
            assert!(!lava.is_lava(vent.outlet));
        }
    }

    #[test]
    fn eruption_clears_previous_lava_and_vents() {
        let (mut grid, mut lava) = rock_world(32);
        let params = EcologyParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        erupt(Vec2::new(16.0, 16.0), 6.0, &mut grid, &mut lava, &params, &mut rng);
        let stray = grid.dims.index(19, 16).unwrap();
        lava.place_live(&mut grid, stray, 4, 0.5, None);
        erupt(Vec2::new(16.0, 16.0), 6.0, &mut grid, &mut lava, &params, &mut rng);
        assert!(!lava.is_lava(stray));
        assert_eq!(grid.ground.current()[stray], Ground::Mountain);
        assert!(lava.vents.len() as u32 <= params.vent_count_max);
    }

    #[test]
    fn eruption_roll_scales_with_mask() {
        let (mut grid, mut lava) = rock_world(32);
        let params = EcologyParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut queue = vec![
            PendingEruption { center: Vec2::new(8.0, 8.0), radius: 5.0, mean_mask: 0.0 },
            PendingEruption { center: Vec2::new(20.0, 20.0), radius: 5.0, mean_mask: 1.0 },
        ];
        let tally = resolve_eruptions(&mut queue, &mut grid, &mut lava, &params, &mut rng);
        assert_eq!(tally, EruptionTally { triggered: 1, fizzled: 1 });
        assert!(queue.is_empty());
        assert!(lava.lava_tiles() > 0);
    }
}
