use rand::Rng;

use crate::{
    cell::{Ground, Vegetation},
    config::EcologyParams,
    grid::EcologyGrid,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireStepStats {
    pub ignited: u32,
    pub extinguished: u32,
    pub burnt_out: u32,
}

/// Burn down, extinguish and spread fire for one tick.
///
/// Every decision reads the frozen current burn state, so a cell lit this
/// tick cannot light its neighbours until the next one.
pub fn step_fire(
    grid: &mut EcologyGrid,
    rain: &[f32],
    params: &EcologyParams,
    rng: &mut impl Rng,
) -> FireStepStats {
    let mut stats = FireStepStats::default();
    let dims = grid.dims;
    grid.burn_ttl.begin();
    grid.vegetation.begin();
    let ground = grid.ground.current();
    let (burn, burn_next) = grid.burn_ttl.split();
    let (vegetation, vegetation_next) = grid.vegetation.split();
    if burn.len() != dims.len() || vegetation.len() != dims.len() || ground.len() != dims.len() {
        return stats;
    }
    let burn_ticks = params.fire_burn_ticks.min(u16::MAX as u32) as u16;

    for idx in 0..dims.len() {
        let wet = rain.get(idx).copied().unwrap_or(0.0);
        if burn[idx] > 0 {
            if rng.gen::<f32>() < params.fire_rain_extinguish * wet {
                burn_next[idx] = 0;
                stats.extinguished += 1;
                continue;
            }
            let remaining = burn[idx] - 1;
            burn_next[idx] = remaining;
            if remaining == 0 {
                vegetation_next[idx] = Vegetation::None;
                stats.burnt_out += 1;
            }
            continue;
        }
        if !vegetation[idx].is_vegetated() {
            continue;
        }

        let damp = (1.0 - params.fire_rain_dampen * wet).max(0.0);
        let burning_neighbours = dims.count_neighbors(idx, burn, |ttl| *ttl > 0);
        let chance = if burning_neighbours > 0 {
            1.0 - (1.0 - params.fire_spread_chance * damp).powi(burning_neighbours as i32)
        } else if ground[idx] == Ground::Lava
            || dims.count_neighbors(idx, ground, |g| *g == Ground::Lava) > 0
        {
            params.lava_ignite_chance * damp
        } else {
            continue;
        };
        if rng.gen::<f32>() < chance {
            burn_next[idx] = burn_ticks;
            stats.ignited += 1;
        }
    }

    grid.burn_ttl.swap();
    grid.vegetation.swap();
    stats
}

/// Set a vegetated, non-burning live cell alight.
pub fn ignite(grid: &mut EcologyGrid, idx: usize, params: &EcologyParams) -> bool {
    let vegetated = grid.vegetation.get(idx).map(|v| v.is_vegetated()).unwrap_or(false);
    if !vegetated || grid.is_burning(idx) {
        return false;
    }
    let burn_ticks = params.fire_burn_ticks.min(u16::MAX as u32) as u16;
    grid.burn_ttl.write_current(idx, burn_ticks);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDims;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn meadow(size: u32) -> EcologyGrid {
        let mut grid = EcologyGrid::new(GridDims::new(size, size));
        grid.vegetation.fill(Vegetation::Grass);
        grid
    }

    #[test]
    fn fire_spreads_one_ring_per_tick() {
        let mut grid = meadow(9);
        let mut params = EcologyParams::default();
        params.fire_spread_chance = 1.0;
        let centre = grid.dims.index(4, 4).unwrap();
        assert!(ignite(&mut grid, centre, &params));
        let dry = vec![0.0; grid.len()];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        step_fire(&mut grid, &dry, &params, &mut rng);
        let burning: Vec<usize> = (0..grid.len()).filter(|i| grid.is_burning(*i)).collect();
        assert_eq!(burning.len(), 9);
        assert!(burning.iter().all(|i| grid.dims.distance(*i, centre) < 1.5));
    }

    #[test]
    fn burnt_out_cells_lose_vegetation() {
        let mut grid = meadow(3);
        let mut params = EcologyParams::default();
        params.fire_burn_ticks = 2;
        params.fire_spread_chance = 0.0;
        let idx = grid.dims.index(1, 1).unwrap();
        ignite(&mut grid, idx, &params);
        let dry = vec![0.0; grid.len()];
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        step_fire(&mut grid, &dry, &params, &mut rng);
        assert!(grid.is_burning(idx));
        let stats = step_fire(&mut grid, &dry, &params, &mut rng);
        assert_eq!(stats.burnt_out, 1);
        assert!(!grid.is_burning(idx));
        assert_eq!(grid.vegetation.current()[idx], Vegetation::None);
    }

    #[test]
    fn saturating_rain_blocks_spread_and_extinguishes() {
        let mut grid = meadow(5);
        let mut params = EcologyParams::default();
        params.fire_rain_dampen = 1.0;
        params.fire_rain_extinguish = 1.0;
        let idx = grid.dims.index(2, 2).unwrap();
        ignite(&mut grid, idx, &params);
        let soaked = vec![1.0; grid.len()];
        let stats = step_fire(&mut grid, &soaked, &params, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(stats.ignited, 0);
        assert_eq!(stats.extinguished, 1);
        assert!((0..grid.len()).all(|i| !grid.is_burning(i)));
        assert_eq!(grid.vegetation.current()[idx], Vegetation::Grass);
    }

    #[test]
    fn lava_adjacency_ignites() {
        let mut grid = meadow(3);
        let mut params = EcologyParams::default();
        params.lava_ignite_chance = 1.0;
        let lava = grid.dims.index(0, 0).unwrap();
        grid.ground.write_current(lava, Ground::Lava);
        let dry = vec![0.0; grid.len()];
        let stats = step_fire(&mut grid, &dry, &params, &mut ChaCha8Rng::seed_from_u64(4));
        assert_eq!(stats.ignited, 4);
        assert!(grid.is_burning(grid.dims.index(1, 1).unwrap()));
        assert!(!grid.is_burning(grid.dims.index(2, 2).unwrap()));
    }

    #[test]
    fn ignite_requires_vegetation() {
        let mut grid = EcologyGrid::new(GridDims::new(4, 4));
        let params = EcologyParams::default();
        assert!(!ignite(&mut grid, 5, &params));
        assert!(!ignite(&mut grid, 500, &params));
    }
}
