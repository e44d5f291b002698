use bevy::prelude::*;
use rand::Rng;

use crate::{
    cell::{CellState, Direction, Ground, Vegetation},
    config::EcologyParams,
    noise::NoiseField,
};

/// A layer with a readable `current` half and a writable `next` half.
///
/// A phase calls [`DoubleBuffer::begin`] to derive `next` from `current`,
/// writes only into `next`, then calls [`DoubleBuffer::swap`]. Reads during
/// the phase see the frozen previous state.
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    current: Vec<T>,
    next: Vec<T>,
}

impl<T: Clone> DoubleBuffer<T> {
    pub fn new(len: usize, fill: T) -> Self {
        Self {
            current: vec![fill.clone(); len],
            next: vec![fill; len],
        }
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current(&self) -> &[T] {
        &self.current
    }

    /// Direct access to the live half, for resets and debug mutators only.
    pub fn current_mut(&mut self) -> &mut [T] {
        &mut self.current
    }

    pub fn next(&self) -> &[T] {
        &self.next
    }

    pub fn next_mut(&mut self) -> &mut [T] {
        &mut self.next
    }

    /// Borrow both halves at once: frozen input and writable output.
    pub fn split(&mut self) -> (&[T], &mut [T]) {
        (&self.current, &mut self.next)
    }

    pub fn get(&self, idx: usize) -> Option<T> {
        self.current.get(idx).cloned()
    }

    pub fn get_next(&self, idx: usize) -> Option<T> {
        self.next.get(idx).cloned()
    }

    /// Write into `next`; out-of-range indices are ignored.
    pub fn write(&mut self, idx: usize, value: T) {
        if let Some(slot) = self.next.get_mut(idx) {
            *slot = value;
        }
    }

    /// Write into `current`; out-of-range indices are ignored.
    pub fn write_current(&mut self, idx: usize, value: T) {
        if let Some(slot) = self.current.get_mut(idx) {
            *slot = value;
        }
    }

    pub fn begin(&mut self) {
        if self.next.len() != self.current.len() {
            self.next = self.current.clone();
        } else {
            self.next.clone_from_slice(&self.current);
        }
    }

    pub fn fill_next(&mut self, value: T) {
        self.next.iter_mut().for_each(|slot| *slot = value.clone());
    }

    pub fn fill(&mut self, value: T) {
        self.current.iter_mut().for_each(|slot| *slot = value.clone());
        self.next.iter_mut().for_each(|slot| *slot = value.clone());
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}

/// Row-major grid dimensions and neighbourhood helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
}

impl GridDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    #[inline]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> (i32, i32) {
        let w = self.width.max(1) as usize;
        ((idx % w) as i32, (idx / w) as i32)
    }

    /// The in-bounds cell one step from `idx` along `dir`.
    pub fn step(&self, idx: usize, dir: Direction) -> Option<usize> {
        let (x, y) = self.coords(idx);
        let (dx, dy) = dir.offset();
        self.index(x + dx, y + dy)
    }

    /// In-bounds Moore neighbours in [`Direction::ALL`] order.
    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = (Direction, usize)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| self.step(idx, dir).map(|n| (dir, n)))
    }

    pub fn count_neighbors<T>(&self, idx: usize, layer: &[T], pred: impl Fn(&T) -> bool) -> u8 {
        self.neighbors(idx)
            .filter(|&(_, n)| layer.get(n).map(&pred).unwrap_or(false))
            .count() as u8
    }

    pub fn distance(&self, a: usize, b: usize) -> f32 {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        let dx = (ax - bx) as f32;
        let dy = (ay - by) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Inclusive cell bounds of a box around `center`, clamped to the grid.
    pub fn clamp_box(&self, center: Vec2, half_extent: Vec2) -> Option<(i32, i32, i32, i32)> {
        if self.is_empty() {
            return None;
        }
        let x0 = (center.x - half_extent.x).floor().max(0.0) as i32;
        let y0 = (center.y - half_extent.y).floor().max(0.0) as i32;
        let x1 = (center.x + half_extent.x).ceil().min(self.width as f32 - 1.0) as i32;
        let y1 = (center.y + half_extent.y).ceil().min(self.height as f32 - 1.0) as i32;
        if x0 > x1 || y0 > y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

/// Terrain, plant cover and burn state.
#[derive(Resource, Debug, Clone)]
pub struct EcologyGrid {
    pub dims: GridDims,
    pub ground: DoubleBuffer<Ground>,
    pub vegetation: DoubleBuffer<Vegetation>,
    pub burn_ttl: DoubleBuffer<u16>,
    pub tectonic_baseline: Vec<f32>,
}

impl EcologyGrid {
    pub fn new(dims: GridDims) -> Self {
        let len = dims.len();
        Self {
            dims,
            ground: DoubleBuffer::new(len, Ground::Dirt),
            vegetation: DoubleBuffer::new(len, Vegetation::None),
            burn_ttl: DoubleBuffer::new(len, 0),
            tectonic_baseline: vec![0.0; len],
        }
    }

    /// Build the initial terrain: tectonic noise, rock sprinkling, grass patches.
    pub fn generate(
        dims: GridDims,
        params: &EcologyParams,
        noise: &NoiseField,
        rng: &mut impl Rng,
    ) -> Self {
        let mut grid = Self::new(dims);
        grid.tectonic_baseline = noise.normalised_field(dims, params.tectonic_noise_scale, 0x7EC7);

        let ground = grid.ground.current_mut();
        for (idx, slot) in ground.iter_mut().enumerate() {
            let bias = 0.5 + grid.tectonic_baseline[idx];
            if rng.gen::<f32>() < params.rock_fraction * bias {
                *slot = Ground::Rock;
            }
        }

        let radius = params.grass_patch_radius as i32;
        for _ in 0..params.grass_patch_count {
            if dims.is_empty() {
                break;
            }
            let cx = rng.gen_range(0..dims.width) as i32;
            let cy = rng.gen_range(0..dims.height) as i32;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx * dx + dy * dy > radius * radius {
                        continue;
                    }
                    let Some(idx) = dims.index(cx + dx, cy + dy) else {
                        continue;
                    };
                    if grid.ground.current()[idx] == Ground::Dirt {
                        grid.vegetation.write_current(idx, Vegetation::Grass);
                    }
                }
            }
        }

        let ground = grid.ground.current().to_vec();
        grid.ground.next_mut().clone_from_slice(&ground);
        let vegetation = grid.vegetation.current().to_vec();
        grid.vegetation.next_mut().clone_from_slice(&vegetation);
        grid
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn is_burning(&self, idx: usize) -> bool {
        self.burn_ttl.get(idx).map(|ttl| ttl > 0).unwrap_or(false)
    }

    pub fn cell_state(&self, idx: usize) -> Option<CellState> {
        Some(CellState {
            ground: self.ground.get(idx)?,
            vegetation: self.vegetation.get(idx)?,
            burning: self.is_burning(idx),
        })
    }

    /// Overwrite every cell's ground, clearing plant cover and fire.
    pub fn fill_ground(&mut self, ground: Ground) {
        self.ground.fill(ground);
        self.vegetation.fill(Vegetation::None);
        self.burn_ttl.fill(0);
    }
}
