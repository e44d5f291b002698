#![allow(dead_code)]

use bevy::math::Vec2;
use ecosim_core::{EcologyConfig, EcologyPhases, Ecosystem, Ground, Vegetation};

/// A world of bare, level rock with only the lava phase running.
pub fn flat_rock_world(size: u32, seed: u64) -> Ecosystem {
    let mut world = Ecosystem::new(EcologyConfig::new(size, size, seed));
    world.set_phases(EcologyPhases::LAVA);
    {
        let mut grid = world.grid_mut();
        grid.fill_ground(Ground::Rock);
        grid.vegetation.fill(Vegetation::None);
        grid.tectonic_baseline.iter_mut().for_each(|t| *t = 0.0);
    }
    world.refresh_elevation();
    world
}

/// Greatest distance from `origin` to the centre of any lava tile.
pub fn max_lava_distance(world: &Ecosystem, origin: Vec2) -> f32 {
    let dims = world.dims();
    world
        .lava_height()
        .iter()
        .enumerate()
        .filter(|(_, h)| **h > 0)
        .map(|(idx, _)| {
            let (x, y) = dims.coords(idx);
            Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(origin)
        })
        .fold(0.0, f32::max)
}

pub fn assert_height_matches_ground(world: &Ecosystem) {
    for (idx, (ground, height)) in world.ground().iter().zip(world.lava_height()).enumerate() {
        assert_eq!(
            *ground == Ground::Lava,
            *height > 0,
            "tick {} cell {idx}: ground {:?} height {height}",
            world.tick(),
            ground
        );
    }
}
