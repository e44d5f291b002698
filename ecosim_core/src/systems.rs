use bevy::{ecs::system::SystemParam, prelude::*};

use crate::{
    config::{EcologyConfig, EcologyParams},
    fire,
    grid::{EcologyGrid, GridDims},
    lava::{step_lava, LavaField},
    metrics::{self, EcologyTelemetry, RegionCounts},
    noise::NoiseField,
    rain::{self, clean_rain_mask, RainRegion, RainRegions},
    regions::{
        compact, footprint_mean, rasterize_region, spawn_roll, RegionEvent, RegionMasks,
        VolcanoProtoRegion, VolcanoRegions,
    },
    resources::{EcologyPhases, EruptionQueue, PendingEruption, PhaseStats, SimRng, SimulationTick},
    tectonics, vegetation,
};

#[derive(SystemParam)]
pub struct RegionState<'w> {
    masks: ResMut<'w, RegionMasks>,
    rain: ResMut<'w, RainRegions>,
    volcanoes: ResMut<'w, VolcanoRegions>,
    queue: ResMut<'w, EruptionQueue>,
}

#[derive(SystemParam)]
pub struct WorldContext<'w> {
    config: Res<'w, EcologyConfig>,
    phases: Res<'w, EcologyPhases>,
    noise: Res<'w, NoiseField>,
    tick: Res<'w, SimulationTick>,
}

pub fn begin_tick(mut stats: ResMut<PhaseStats>) {
    stats.reset();
}

/// Rasterise last tick's regions into fresh masks, then age them. Proto
/// volcanoes that run out queue an eruption roll weighted by the mask they
/// leave behind.
#[allow(clippy::too_many_arguments)]
pub fn update_regions(
    dims: GridDims,
    noise: &NoiseField,
    params: &EcologyParams,
    tick: u64,
    phases: EcologyPhases,
    masks: &mut RegionMasks,
    rain_regions: &mut Vec<RainRegion>,
    volcano_regions: &mut Vec<VolcanoProtoRegion>,
    queue: &mut Vec<PendingEruption>,
) {
    if !phases.contains(EcologyPhases::RAIN) {
        rain_regions.clear();
    }
    masks.rain.fill_next(0.0);
    masks.volcano.fill_next(0.0);
    for region in rain_regions.iter() {
        rasterize_region(region, dims, noise, masks.rain.next_mut());
    }
    for region in volcano_regions.iter() {
        rasterize_region(region, dims, noise, masks.volcano.next_mut());
    }
    clean_rain_mask(masks.rain.next_mut(), dims, params.rain_min_island_area);
    masks.rain.swap();
    masks.volcano.swap();

    let advance = rain::advance_rain(rain_regions, dims, noise, params, tick);
    if advance.expired > 0 {
        tracing::debug!(
            target: "ecosim::regions",
            expired = advance.expired,
            merged = advance.merged,
            "rain.expired"
        );
    }

    for region in volcano_regions.iter_mut() {
        region.advance(&());
    }
    let volcano_phase = phases.contains(EcologyPhases::VOLCANO);
    for region in volcano_regions.iter().filter(|r| r.is_expired()) {
        tracing::debug!(
            target: "ecosim::regions",
            x = region.center.x,
            y = region.center.y,
            "volcano.expired"
        );
        if volcano_phase {
            queue.push(PendingEruption {
                center: region.center,
                radius: region.radius,
                mean_mask: footprint_mean(region.center, region.radius, dims, masks.volcano.current()),
            });
        }
    }
    compact(volcano_regions);
}

pub fn rasterize_regions(
    context: WorldContext,
    grid: Res<EcologyGrid>,
    mut state: RegionState,
) {
    let RegionState {
        masks,
        rain,
        volcanoes,
        queue,
    } = &mut state;
    update_regions(
        grid.dims,
        &context.noise,
        &context.config.params,
        context.tick.0,
        *context.phases,
        masks,
        &mut rain.0,
        &mut volcanoes.0,
        &mut queue.0,
    );
}

pub fn apply_uplift(
    config: Res<EcologyConfig>,
    masks: Res<RegionMasks>,
    mut grid: ResMut<EcologyGrid>,
    mut rng: ResMut<SimRng>,
    mut stats: ResMut<PhaseStats>,
) {
    stats.uplifted = tectonics::apply_uplift(&mut grid, masks.volcano.current(), &config.params, &mut rng.0);
}

pub fn resolve_eruptions(
    config: Res<EcologyConfig>,
    mut queue: ResMut<EruptionQueue>,
    mut grid: ResMut<EcologyGrid>,
    mut lava: ResMut<LavaField>,
    mut rng: ResMut<SimRng>,
    mut stats: ResMut<PhaseStats>,
) {
    if queue.0.is_empty() {
        return;
    }
    let tally = tectonics::resolve_eruptions(&mut queue.0, &mut grid, &mut lava, &config.params, &mut rng.0);
    stats.eruptions_triggered += tally.triggered;
    stats.eruptions_fizzled += tally.fizzled;
}

pub fn advance_lava(
    config: Res<EcologyConfig>,
    masks: Res<RegionMasks>,
    mut grid: ResMut<EcologyGrid>,
    mut lava: ResMut<LavaField>,
    mut rng: ResMut<SimRng>,
    mut stats: ResMut<PhaseStats>,
) {
    let step = step_lava(&mut lava, &mut grid, masks.rain.current(), &config.params, &mut rng.0);
    stats.lava_injected += step.injected;
    stats.lava_advanced += step.advanced;
    stats.lava_splits += step.splits;
    stats.lava_pooled += step.pooled;
    stats.lava_solidified += step.solidified;
}

pub fn advance_fire(
    config: Res<EcologyConfig>,
    masks: Res<RegionMasks>,
    mut grid: ResMut<EcologyGrid>,
    mut rng: ResMut<SimRng>,
    mut stats: ResMut<PhaseStats>,
) {
    let step = fire::step_fire(&mut grid, masks.rain.current(), &config.params, &mut rng.0);
    stats.ignitions += step.ignited;
    stats.extinguished += step.extinguished;
}

pub fn advance_vegetation(
    config: Res<EcologyConfig>,
    masks: Res<RegionMasks>,
    mut grid: ResMut<EcologyGrid>,
    mut rng: ResMut<SimRng>,
) {
    vegetation::step_vegetation(&mut grid, masks.rain.current(), &config.params, &mut rng.0);
}

pub fn spawn_regions(
    context: WorldContext,
    grid: Res<EcologyGrid>,
    mut state: RegionState,
    mut rng: ResMut<SimRng>,
) {
    let params = &context.config.params;
    if context.phases.contains(EcologyPhases::RAIN) {
        let coverage = rain::coverage(state.masks.rain.current());
        rain::try_spawn_rain(&mut state.rain.0, grid.dims, params, coverage, &mut rng.0);
    }
    if context.phases.contains(EcologyPhases::VOLCANO)
        && spawn_roll(
            state.volcanoes.0.len(),
            params.volcano_max_regions,
            params.volcano_spawn_chance,
            &mut rng.0,
        )
    {
        let region = VolcanoProtoRegion::spawn(grid.dims, params, &mut rng.0);
        tracing::debug!(
            target: "ecosim::regions",
            x = region.center.x,
            y = region.center.y,
            radius = region.radius,
            ttl = region.ttl,
            "volcano.spawned"
        );
        state.volcanoes.0.push(region);
    }
}

pub fn collect_telemetry(
    tick: Res<SimulationTick>,
    grid: Res<EcologyGrid>,
    lava: Res<LavaField>,
    masks: Res<RegionMasks>,
    rain: Res<RainRegions>,
    volcanoes: Res<VolcanoRegions>,
    stats: Res<PhaseStats>,
    mut telemetry: ResMut<EcologyTelemetry>,
) {
    metrics::capture(
        &mut telemetry,
        tick.0 + 1,
        &grid,
        &lava,
        masks.rain.current(),
        RegionCounts {
            rain: rain.0.len() as u32,
            volcano: volcanoes.0.len() as u32,
        },
        &stats,
    );
}

pub fn advance_tick(mut tick: ResMut<SimulationTick>) {
    tick.0 += 1;
}

/// Erupt immediately at a cell using the mean proto-volcano radius.
pub fn debug_erupt_at(
    In((x, y)): In<(i32, i32)>,
    config: Res<EcologyConfig>,
    mut grid: ResMut<EcologyGrid>,
    mut lava: ResMut<LavaField>,
    mut rng: ResMut<SimRng>,
) -> bool {
    if grid.dims.index(x, y).is_none() {
        return false;
    }
    let params = &config.params;
    let radius = (params.volcano_radius_min + params.volcano_radius_max) * 0.5;
    let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
    let outcome = tectonics::erupt(center, radius, &mut grid, &mut lava, params, &mut rng.0);
    tracing::info!(
        target: "ecosim::tectonics",
        x,
        y,
        radius,
        vents = outcome.vents,
        "eruption.forced"
    );
    true
}

/// Regenerate every piece of world state from `seed`, keeping the
/// configured dimensions, parameters and phase flags.
pub fn reset_world(world: &mut World, seed: u64) {
    let config = world
        .get_resource::<EcologyConfig>()
        .cloned()
        .unwrap_or_default()
        .with_seed(seed);
    let dims = GridDims::new(config.width, config.height);
    let noise = NoiseField::new(seed);
    let mut rng = SimRng::from_seed(seed);
    let grid = EcologyGrid::generate(dims, &config.params, &noise, &mut rng.0);
    let mut lava = LavaField::new(dims);
    lava.reset_elevation(&grid);
    let masks = RegionMasks::new(dims);

    let mut telemetry = EcologyTelemetry::default();
    metrics::capture(
        &mut telemetry,
        0,
        &grid,
        &lava,
        masks.rain.current(),
        RegionCounts::default(),
        &PhaseStats::default(),
    );

    if !world.contains_resource::<EcologyPhases>() {
        world.insert_resource(EcologyPhases::default());
    }
    world.insert_resource(config);
    world.insert_resource(noise);
    world.insert_resource(rng);
    world.insert_resource(grid);
    world.insert_resource(lava);
    world.insert_resource(masks);
    world.insert_resource(RainRegions::default());
    world.insert_resource(VolcanoRegions::default());
    world.insert_resource(EruptionQueue::default());
    world.insert_resource(PhaseStats::default());
    world.insert_resource(telemetry);
    world.insert_resource(SimulationTick(0));
    tracing::info!(
        target: "ecosim::config",
        seed,
        width = dims.width,
        height = dims.height,
        "world.reset"
    );
}
