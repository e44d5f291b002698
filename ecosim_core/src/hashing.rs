use std::hash::Hasher;

use crate::{
    grid::EcologyGrid,
    lava::LavaField,
    rain::RainRegion,
    regions::VolcanoProtoRegion,
};

/// A deterministic FNV-1a 64-bit hasher.
///
/// `DefaultHasher` is randomly keyed per process, so state digests that
/// must agree across runs and worker threads go through this instead.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }

    fn write_f32(&mut self, value: f32) {
        self.write(&value.to_bits().to_le_bytes());
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Digest of every live layer and transient list. The tick counter is
/// left out so a world that has stopped changing keeps its digest.
pub fn state_digest(
    grid: &EcologyGrid,
    lava: &LavaField,
    rain_regions: &[RainRegion],
    volcano_regions: &[VolcanoProtoRegion],
    rain_mask: &[f32],
    volcano_mask: &[f32],
) -> u64 {
    let mut hasher = FnvHasher::new();
    for idx in 0..grid.len() {
        if let Some(state) = grid.cell_state(idx) {
            hasher.write_u8(state.pack());
        }
    }
    for ttl in grid.burn_ttl.current() {
        hasher.write_u16(*ttl);
    }
    for height in lava.height.current() {
        hasher.write_u8(*height);
    }
    for temperature in lava.temperature.current() {
        hasher.write_f32(*temperature);
    }
    for direction in lava.direction.current() {
        hasher.write_u8(direction.map(|d| d as u8 + 1).unwrap_or(0));
    }
    for (tip, forced) in lava.tip.current().iter().zip(lava.forced.current()) {
        hasher.write_u8(*tip as u8 | (*forced as u8) << 1);
    }
    for channel in lava.channel.current() {
        hasher.write_f32(*channel);
    }
    for elevation in &lava.elevation {
        hasher.write_i16(*elevation);
    }
    for vent in &lava.vents {
        hasher.write_usize(vent.source);
        hasher.write_usize(vent.outlet);
        hasher.write_u32(vent.mass);
    }
    hasher.write_u64(lava.injected_total);
    for region in rain_regions {
        hasher.write_f32(region.center.x);
        hasher.write_f32(region.center.y);
        hasher.write_f32(region.strength);
        hasher.write_i32(region.ttl);
    }
    for region in volcano_regions {
        hasher.write_f32(region.center.x);
        hasher.write_f32(region.center.y);
        hasher.write_i32(region.ttl);
    }
    for value in rain_mask.iter().chain(volcano_mask) {
        hasher.write_f32(*value);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cell::Ground, grid::GridDims};

    #[test]
    fn fnv_matches_reference_vector() {
        let mut hasher = FnvHasher::new();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn digest_tracks_layer_changes() {
        let dims = GridDims::new(6, 6);
        let mut grid = EcologyGrid::new(dims);
        let lava = LavaField::new(dims);
        let mask = vec![0.0; dims.len()];
        let before = state_digest(&grid, &lava, &[], &[], &mask, &mask);
        assert_eq!(before, state_digest(&grid, &lava, &[], &[], &mask, &mask));
        grid.ground.write_current(3, Ground::Rock);
        assert_ne!(before, state_digest(&grid, &lava, &[], &[], &mask, &mask));
    }
}
