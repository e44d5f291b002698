use rand::Rng;

use crate::{
    cell::{Ground, Vegetation},
    config::EcologyParams,
    grid::EcologyGrid,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VegetationStepStats {
    pub grown: u32,
    pub seeded: u32,
    pub weathered: u32,
    pub cleared: u32,
}

/// One succession tick. Lava clears plant cover and puts out fires, burning
/// cells hold still, every other cell may advance at most one stage.
pub fn step_vegetation(
    grid: &mut EcologyGrid,
    rain: &[f32],
    params: &EcologyParams,
    rng: &mut impl Rng,
) -> VegetationStepStats {
    let mut stats = VegetationStepStats::default();
    let dims = grid.dims;
    grid.vegetation.begin();
    grid.ground.begin();
    grid.burn_ttl.begin();
    let (burn, burn_next) = grid.burn_ttl.split();
    let (vegetation, vegetation_next) = grid.vegetation.split();
    let (ground, ground_next) = grid.ground.split();
    if vegetation.len() != dims.len() || ground.len() != dims.len() || burn.len() != dims.len() {
        return stats;
    }

    for idx in 0..dims.len() {
        let stage = vegetation[idx];
        if ground[idx] == Ground::Lava {
            if stage.is_vegetated() {
                vegetation_next[idx] = Vegetation::None;
                stats.cleared += 1;
            }
            burn_next[idx] = 0;
            continue;
        }
        if burn[idx] > 0 {
            continue;
        }

        let grass_neighbours = dims.count_neighbors(idx, vegetation, |v| v.is_vegetated()) as u32;
        let boost = 1.0 + params.rain_growth_boost * rain.get(idx).copied().unwrap_or(0.0);

        match stage {
            Vegetation::None => match ground[idx] {
                Ground::Dirt => {
                    let established = grass_neighbours > 0 && grass_neighbours >= params.grass_neighbor_min;
                    let chance = if established {
                        params.grass_growth_chance
                    } else {
                        params.grass_seed_chance
                    };
                    if roll(rng, chance, boost) {
                        vegetation_next[idx] = Vegetation::Grass;
                        if established {
                            stats.grown += 1;
                        } else {
                            stats.seeded += 1;
                        }
                    }
                }
                Ground::Rock if grass_neighbours > 0 => {
                    if roll(rng, params.rock_weathering_chance, boost) {
                        ground_next[idx] = Ground::Dirt;
                        stats.weathered += 1;
                    }
                }
                _ => {}
            },
            Vegetation::Grass => {
                if grass_neighbours >= params.shrub_neighbor_min && roll(rng, params.shrub_growth_chance, boost) {
                    vegetation_next[idx] = Vegetation::Shrub;
                    stats.grown += 1;
                }
            }
            Vegetation::Shrub => {
                let shrub_neighbours =
                    dims.count_neighbors(idx, vegetation, |v| *v >= Vegetation::Shrub) as u32;
                if shrub_neighbours >= params.tree_neighbor_min && roll(rng, params.tree_growth_chance, boost) {
                    vegetation_next[idx] = Vegetation::Tree;
                    stats.grown += 1;
                }
            }
            Vegetation::Tree => {}
        }
    }

    grid.vegetation.swap();
    grid.ground.swap();
    grid.burn_ttl.swap();
    stats
}

fn roll(rng: &mut impl Rng, chance: f32, boost: f32) -> bool {
    rng.gen::<f32>() < (chance * boost).min(1.0)
}
