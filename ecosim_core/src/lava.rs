//! Vent-fed lava: injection, tip advection with candidate scoring and
//! splitting, pooling, cooling/crusting, channel memory and tip detection.
//!
//! Every sub-step writes into the `next` halves after a single `begin`, and
//! the lava layers swap together with the ground layer at the end of the
//! phase, so `Ground == Lava` and `height > 0` flip in lockstep.

use bevy::prelude::*;
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;

use crate::{
    cell::{Direction, Ground},
    config::EcologyParams,
    grid::{DoubleBuffer, EcologyGrid, GridDims},
};

pub const MAX_LAVA_HEIGHT: u8 = 7;
/// Elevation units per unit of lava height when judging uphill walls.
const HEIGHT_ELEVATION: f32 = 4.0;
const ELEVATION_NORMALISER: f32 = 4.0;
const MOUNTAIN_WALL: f32 = 0.5;
const TIP_MAX_NEIGHBOURS: u8 = 2;

/// Base pseudo-height of a ground type before noise and volcanic slope.
pub fn base_elevation(ground: Ground) -> i16 {
    match ground {
        Ground::Dirt => 0,
        Ground::Rock => 2,
        Ground::Mountain => 10,
        Ground::Lava => 2,
    }
}

/// Resting elevation of undisturbed terrain.
pub fn terrain_elevation(ground: Ground, tectonic: f32) -> i16 {
    base_elevation(ground) + (tectonic.clamp(0.0, 1.0) * 4.0).round() as i16
}

/// A reservoir-backed source that feeds a fixed cell and its outlet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LavaVent {
    pub source: usize,
    pub mass: u32,
    pub initial_mass: u32,
    pub heading: Option<Direction>,
    pub outlet: usize,
    /// Remaining reservoir fraction.
    pub head_pressure: f32,
    pub gain: u32,
}

impl LavaVent {
    pub fn new(source: usize, outlet: usize, heading: Option<Direction>, mass: u32, gain: u32) -> Self {
        Self {
            source,
            mass,
            initial_mass: mass,
            heading,
            outlet,
            head_pressure: 1.0,
            gain: gain.max(1),
        }
    }
}

#[derive(Resource, Debug, Clone)]
pub struct LavaField {
    pub dims: GridDims,
    pub height: DoubleBuffer<u8>,
    pub temperature: DoubleBuffer<f32>,
    pub direction: DoubleBuffer<Option<Direction>>,
    pub tip: DoubleBuffer<bool>,
    pub forced: DoubleBuffer<bool>,
    pub channel: DoubleBuffer<f32>,
    pub elevation: Vec<i16>,
    pub vents: Vec<LavaVent>,
    pub injected_total: u64,
}

impl LavaField {
    pub fn new(dims: GridDims) -> Self {
        let len = dims.len();
        Self {
            dims,
            height: DoubleBuffer::new(len, 0),
            temperature: DoubleBuffer::new(len, 0.0),
            direction: DoubleBuffer::new(len, None),
            tip: DoubleBuffer::new(len, false),
            forced: DoubleBuffer::new(len, false),
            channel: DoubleBuffer::new(len, 0.0),
            elevation: vec![0; len],
            vents: Vec::new(),
            injected_total: 0,
        }
    }

    /// Rebuild the whole elevation raster from terrain and tectonic noise.
    pub fn reset_elevation(&mut self, grid: &EcologyGrid) {
        self.elevation = grid
            .ground
            .current()
            .iter()
            .enumerate()
            .map(|(idx, ground)| {
                terrain_elevation(*ground, grid.tectonic_baseline.get(idx).copied().unwrap_or(0.0))
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn is_lava(&self, idx: usize) -> bool {
        self.height.get(idx).map(|h| h > 0).unwrap_or(false)
    }

    pub fn elevation_at(&self, idx: usize) -> i16 {
        self.elevation.get(idx).copied().unwrap_or(0)
    }

    pub fn lava_tiles(&self) -> usize {
        self.height.current().iter().filter(|h| **h > 0).count()
    }

    pub fn tip_count(&self) -> usize {
        self.tip.current().iter().filter(|t| **t).count()
    }

    fn begin(&mut self) {
        self.height.begin();
        self.temperature.begin();
        self.direction.begin();
        self.tip.begin();
        self.forced.begin();
        self.channel.begin();
    }

    fn swap(&mut self) {
        self.height.swap();
        self.temperature.swap();
        self.direction.swap();
        self.tip.swap();
        self.forced.swap();
        self.channel.swap();
    }

    /// Put molten lava on a live cell. Used by eruptions and debug tools.
    pub fn place_live(
        &mut self,
        grid: &mut EcologyGrid,
        idx: usize,
        height: u8,
        temperature: f32,
        direction: Option<Direction>,
    ) {
        if idx >= self.len() || idx >= grid.len() || height == 0 {
            return;
        }
        self.height.write_current(idx, height.min(MAX_LAVA_HEIGHT));
        self.temperature.write_current(idx, temperature.clamp(0.0, 1.0));
        self.direction.write_current(idx, direction);
        self.tip.write_current(idx, false);
        self.forced.write_current(idx, false);
        grid.ground.write_current(idx, Ground::Lava);
    }

    /// Remove lava from a live cell, leaving rock behind. Channel memory stays.
    pub fn clear_live(&mut self, grid: &mut EcologyGrid, idx: usize) {
        if !self.is_lava(idx) {
            return;
        }
        self.height.write_current(idx, 0);
        self.temperature.write_current(idx, 0.0);
        self.direction.write_current(idx, None);
        self.tip.write_current(idx, false);
        self.forced.write_current(idx, false);
        grid.ground.write_current(idx, Ground::Rock);
    }

    /// Heading to the lowest strictly lower neighbour, first in heading order on ties.
    pub fn downhill(&self, idx: usize) -> Option<Direction> {
        let own = self.elevation_at(idx);
        let mut best: Option<(Direction, i16)> = None;
        for (dir, n) in self.dims.neighbors(idx) {
            let e = self.elevation_at(n);
            if e < own && best.map(|(_, b)| e < b).unwrap_or(true) {
                best = Some((dir, e));
            }
        }
        best.map(|(dir, _)| dir)
    }

    fn write_molten(&mut self, idx: usize, height: u8, temperature: f32, direction: Option<Direction>, tip: bool) {
        self.height.write(idx, height.min(MAX_LAVA_HEIGHT));
        self.temperature.write(idx, temperature.clamp(0.0, 1.0));
        self.direction.write(idx, direction);
        self.tip.write(idx, tip);
        self.forced.write(idx, false);
    }

    fn solidify_next(&mut self, idx: usize) {
        self.height.write(idx, 0);
        self.temperature.write(idx, 0.0);
        self.direction.write(idx, None);
        self.tip.write(idx, false);
        self.forced.write(idx, false);
    }

    fn lava_neighbours_next(&self, idx: usize) -> u8 {
        self.dims.count_neighbors(idx, self.height.next(), |h| *h > 0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LavaStepStats {
    pub injected: u32,
    pub advanced: u32,
    pub splits: u32,
    pub pooled: u32,
    pub solidified: u32,
    pub vents_depleted: u32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    idx: usize,
    dir: Direction,
    score: f32,
}

struct Scratch {
    discharging: Vec<bool>,
    advanced: Vec<bool>,
    /// Cells that became tips this tick: advection children and vent outlets.
    spawned: Vec<bool>,
}

/// Advance the lava layers by one tick.
pub fn step_lava(
    lava: &mut LavaField,
    grid: &mut EcologyGrid,
    rain: &[f32],
    params: &EcologyParams,
    rng: &mut impl Rng,
) -> LavaStepStats {
    let mut stats = LavaStepStats::default();
    if lava.len() != grid.len() || lava.is_empty() {
        return stats;
    }
    lava.begin();
    grid.ground.begin();
    let mut scratch = Scratch {
        discharging: vec![false; lava.len()],
        advanced: vec![false; lava.len()],
        spawned: vec![false; lava.len()],
    };

    inject_vents(lava, grid, &mut scratch, &mut stats);
    let stalled = advect_tips(lava, grid, rain, params, rng, &mut scratch, &mut stats);
    pool_stalled(lava, grid, &stalled, params, &mut stats);
    cool(lava, grid, rain, params, &scratch, &mut stats);
    reinforce_channels(lava, params, &scratch);
    detect_tips(lava, params, &scratch);

    lava.swap();
    grid.ground.swap();
    stats
}

fn inject_vents(lava: &mut LavaField, grid: &mut EcologyGrid, scratch: &mut Scratch, stats: &mut LavaStepStats) {
    let mut vents = std::mem::take(&mut lava.vents);
    for vent in &mut vents {
        if vent.gain == 0 || vent.source >= lava.len() || vent.outlet >= lava.len() {
            vent.mass = 0;
            continue;
        }
        scratch.discharging[vent.source] = true;
        scratch.discharging[vent.outlet] = true;

        // A dry source takes the flux itself; afterwards it is reheated and
        // every unit lands on the outlet.
        let source_height = lava.height.next()[vent.source];
        let target = if source_height > 0 { vent.outlet } else { vent.source };
        let room = MAX_LAVA_HEIGHT - lava.height.next()[target];
        let amount = vent.gain.min(vent.mass).min(room as u32);

        if source_height > 0 {
            lava.temperature.write(vent.source, 1.0);
        }
        if amount == 0 {
            continue;
        }
        vent.mass -= amount;
        vent.head_pressure = vent.mass as f32 / vent.initial_mass.max(1) as f32;
        lava.injected_total += amount as u64;
        stats.injected += amount;

        let height = lava.height.next()[target] + amount as u8;
        if target == vent.source {
            let dir = lava.direction.next()[target].or(vent.heading);
            let tip = lava.tip.next()[target];
            lava.write_molten(target, height, 1.0, dir, tip);
        } else {
            let (sx, sy) = lava.dims.coords(vent.source);
            let (ox, oy) = lava.dims.coords(vent.outlet);
            let dir = Direction::from_offset(ox - sx, oy - sy).or(vent.heading);
            lava.write_molten(target, height, 1.0, dir, true);
            scratch.spawned[target] = true;
        }
        grid.ground.write(target, Ground::Lava);
    }
    let before = vents.len();
    vents.retain(|vent| vent.mass > 0);
    let depleted = (before - vents.len()) as u32;
    if depleted > 0 {
        tracing::debug!(target: "ecosim::lava", depleted, "vent.depleted");
    }
    stats.vents_depleted += depleted;
    lava.vents = vents;
}

#[allow(clippy::too_many_arguments)]
fn score_candidates(
    lava: &LavaField,
    grid: &EcologyGrid,
    rain: &[f32],
    params: &EcologyParams,
    idx: usize,
    height: u8,
    heading: Option<Direction>,
    forced: bool,
) -> Vec<Candidate> {
    let mut probes: Vec<Direction> = Vec::with_capacity(8);
    let own = lava.elevation_at(idx);
    match heading {
        Some(dir) => {
            probes.extend([dir, dir.rotate(1), dir.rotate(-1)]);
            for other in Direction::ALL {
                let downhill = lava
                    .dims
                    .step(idx, other)
                    .map(|n| lava.elevation_at(n) < own)
                    .unwrap_or(false);
                if downhill {
                    probes.push(other);
                }
            }
        }
        None => probes.extend(Direction::ALL),
    }

    let src = own as f32;
    let surface = src + HEIGHT_ELEVATION * height as f32;
    let mut candidates: Vec<Candidate> = Vec::with_capacity(8);
    for dir in probes {
        let Some(n) = lava.dims.step(idx, dir) else {
            continue;
        };
        if candidates.iter().any(|c| c.idx == n) {
            continue;
        }
        let ground = grid.ground.get_next(n).unwrap_or(Ground::Lava);
        if lava.height.next()[n] > 0 || ground == Ground::Lava {
            continue;
        }
        let e = lava.elevation_at(n) as f32;
        let drop = (src - e).max(0.0) / ELEVATION_NORMALISER;
        let mut uphill = (e - surface).max(0.0) / ELEVATION_NORMALISER;
        if ground == Ground::Mountain {
            uphill += MOUNTAIN_WALL;
        }
        let align = match (forced, heading) {
            (false, Some(current)) => dir.dot(current),
            _ => 0.0,
        };
        let wet = rain.get(n).copied().unwrap_or(0.0);
        let channel = lava.channel.current().get(n).copied().unwrap_or(0.0);
        let score = params.lava_slope_weight * drop + params.lava_align_weight * align
            - params.lava_rain_weight * wet
            + params.lava_channel_weight * channel
            - params.lava_wall_weight * uphill;
        candidates.push(Candidate { idx: n, dir, score });
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

fn advect_tips(
    lava: &mut LavaField,
    grid: &mut EcologyGrid,
    rain: &[f32],
    params: &EcologyParams,
    rng: &mut impl Rng,
    scratch: &mut Scratch,
    stats: &mut LavaStepStats,
) -> Vec<usize> {
    let mut tips: Vec<usize> = lava
        .tip
        .next()
        .iter()
        .enumerate()
        .filter_map(|(idx, tip)| (*tip && lava.height.next()[idx] > 0).then_some(idx))
        .collect();
    tips.shuffle(rng);

    let overflow = params.lava_overflow_height.min(MAX_LAVA_HEIGHT as u32) as u8;
    let mut stalled = Vec::new();
    for idx in tips {
        let height = lava.height.next()[idx];
        if height == 0 {
            continue;
        }
        let temperature = lava.temperature.next()[idx];
        let heading = lava.direction.next()[idx];
        let forced = lava.forced.next()[idx] || height >= overflow;
        let p_move = if forced {
            1.0
        } else {
            params.lava_base_speed * temperature / (1.0 + params.lava_speed_alpha * height as f32)
        };
        let roll: f32 = rng.gen();
        if !forced && roll >= p_move {
            continue;
        }

        let candidates = score_candidates(lava, grid, rain, params, idx, height, heading, forced);
        let accepts = |c: &Candidate| {
            c.score >= params.lava_flow_threshold || (forced && c.score >= 0.0)
        };
        let Some(best) = candidates.first().copied().filter(|c| accepts(c)) else {
            stalled.push(idx);
            continue;
        };

        let child_temp = temperature * params.lava_tip_inherit;
        lava.write_molten(best.idx, 1, child_temp, Some(best.dir), true);
        grid.ground.write(best.idx, Ground::Lava);
        scratch.advanced[best.idx] = true;
        scratch.spawned[best.idx] = true;
        scratch.advanced[idx] = true;
        stats.advanced += 1;

        if height >= params.lava_split_min_height as u8 {
            if let Some(second) = candidates.get(1).copied() {
                if second.score >= params.lava_flow_threshold - params.lava_split_margin
                    && rng.gen::<f32>() < params.lava_split_chance
                {
                    lava.write_molten(second.idx, 1, child_temp, Some(second.dir), true);
                    grid.ground.write(second.idx, Ground::Lava);
                    scratch.advanced[second.idx] = true;
                    scratch.spawned[second.idx] = true;
                    stats.splits += 1;
                }
            }
        }

        lava.height.write(idx, height.saturating_sub(1).max(1));
        lava.tip.write(idx, false);
    }
    stalled
}

fn pool_stalled(
    lava: &mut LavaField,
    grid: &mut EcologyGrid,
    stalled: &[usize],
    params: &EcologyParams,
    stats: &mut LavaStepStats,
) {
    for &idx in stalled {
        let height = (lava.height.next()[idx] + 1).min(MAX_LAVA_HEIGHT);
        lava.height.write(idx, height);
        stats.pooled += 1;

        let own = lava.elevation_at(idx);
        let mut spill: Option<(usize, i16)> = None;
        for (_, n) in lava.dims.neighbors(idx) {
            if lava.height.next()[n] > 0 {
                continue;
            }
            let e = lava.elevation_at(n);
            if e <= own && spill.map(|(_, best)| e < best).unwrap_or(true) {
                spill = Some((n, e));
            }
        }
        if let Some((n, _)) = spill {
            let temperature = lava.temperature.next()[idx] * params.lava_tip_inherit;
            lava.write_molten(n, 1, temperature, None, false);
            grid.ground.write(n, Ground::Lava);
            lava.height.write(idx, height.saturating_sub(1).max(1));
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn cool(
    lava: &mut LavaField,
    grid: &mut EcologyGrid,
    rain: &[f32],
    params: &EcologyParams,
    scratch: &Scratch,
    stats: &mut LavaStepStats,
) {
    let neighbours: Vec<u8> = (0..lava.len())
        .map(|idx| {
            if lava.height.next()[idx] > 0 {
                lava.lava_neighbours_next(idx)
            } else {
                0
            }
        })
        .collect();

    for idx in 0..lava.len() {
        let height = lava.height.next()[idx];
        if height == 0 {
            continue;
        }
        let exposure = 1.0 - neighbours[idx] as f32 / 8.0;
        let wet = rain.get(idx).copied().unwrap_or(0.0);
        let mut delta = params.cool_base
            + params.cool_edge * exposure
            + params.cool_rain * wet
            + params.cool_thick * sigmoid(height as f32 - 2.0);
        if scratch.discharging[idx] {
            delta += params.cool_flux;
        }
        let temperature = (lava.temperature.next()[idx] - delta).max(0.0);
        if temperature > params.crust_threshold {
            lava.temperature.write(idx, temperature);
            continue;
        }
        if height > 1 {
            lava.height.write(idx, height - 1);
            lava.temperature.write(idx, params.crust_reheat);
        } else {
            lava.solidify_next(idx);
            grid.ground.write(idx, Ground::Rock);
            stats.solidified += 1;
        }
    }
}

fn reinforce_channels(lava: &mut LavaField, params: &EcologyParams, scratch: &Scratch) {
    let keep = 1.0 - params.channel_decay;
    let channel = lava.channel.next_mut();
    for (idx, value) in channel.iter_mut().enumerate() {
        if scratch.advanced[idx] {
            *value = (*value + params.channel_grow).min(1.0);
        }
        *value *= keep;
    }
}

/// New cells keep the tip flag they were born with while hot. Anything
/// else qualifies by shape, except a parent that handed its tip on.
fn detect_tips(lava: &mut LavaField, params: &EcologyParams, scratch: &Scratch) {
    let overflow = params.lava_overflow_height as u8;
    for idx in 0..lava.len() {
        let height = lava.height.next()[idx];
        let hot = height > 0 && lava.temperature.next()[idx] >= params.lava_tip_min_temp;
        let is_tip = hot
            && if scratch.spawned[idx] {
                lava.tip.next()[idx]
            } else {
                !scratch.advanced[idx]
                    && lava.direction.next()[idx].is_some()
                    && lava.lava_neighbours_next(idx) <= TIP_MAX_NEIGHBOURS
            };
        lava.tip.write(idx, is_tip);
        lava.forced.write(idx, height > 0 && height >= overflow);
    }
}
