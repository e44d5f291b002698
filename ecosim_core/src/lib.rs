//! Deterministic grid ecosystem simulation.
//!
//! A seeded world of ground, vegetation, lava and fire layers driven by
//! transient rain clouds and proto-volcanoes. One call to [`run_tick`]
//! (or [`Ecosystem::step`]) advances every phase exactly once.

pub mod cell;
pub mod config;
pub mod fire;
pub mod grid;
pub mod hashing;
pub mod lava;
pub mod metrics;
pub mod noise;
mod params;
pub mod rain;
pub mod regions;
mod resources;
pub mod sweep;
mod systems;
pub mod tectonics;
pub mod vegetation;
mod world;

use bevy::{ecs::schedule::ExecutorKind, prelude::*};

pub use cell::{CellState, Direction, Ground, Vegetation};
pub use config::{
    load_ecology_config_from_env, EcologyConfig, EcologyConfigError, EcologyParams, ParamKey,
    ParamKind, ParamSpec, ParamValue,
};
pub use grid::{DoubleBuffer, EcologyGrid, GridDims};
pub use lava::{LavaField, LavaVent};
pub use metrics::EcologyTelemetry;
pub use noise::NoiseField;
pub use rain::{RainRegion, RainRegions};
pub use regions::{RegionEvent, RegionMasks, VolcanoProtoRegion, VolcanoRegions};
pub use resources::{
    phase_enabled, EcologyPhases, EruptionQueue, PendingEruption, PhaseStats, SimRng,
    SimulationTick,
};
pub use sweep::{run_sweep, SweepBudget, SweepTrial, TrialOutcome};
pub use systems::reset_world;
pub use world::Ecosystem;

/// Construct a Bevy [`App`] running the ecology tick pipeline over a world
/// generated from `config`.
pub fn build_headless_app(config: EcologyConfig) -> App {
    let config = config.sanitized();
    let seed = config.seed;
    let mut app = App::new();

    app.insert_resource(config)
        .insert_resource(EcologyPhases::default())
        .add_plugins(MinimalPlugins)
        .add_systems(
            Update,
            (
                systems::begin_tick,
                systems::rasterize_regions,
                systems::apply_uplift.run_if(phase_enabled(EcologyPhases::VOLCANO)),
                systems::resolve_eruptions.run_if(phase_enabled(EcologyPhases::VOLCANO)),
                systems::advance_lava.run_if(phase_enabled(EcologyPhases::LAVA)),
                systems::advance_fire.run_if(phase_enabled(EcologyPhases::FIRE)),
                systems::advance_vegetation.run_if(phase_enabled(EcologyPhases::VEGETATION)),
                systems::spawn_regions,
                systems::collect_telemetry,
                systems::advance_tick,
            )
                .chain(),
        )
        .edit_schedule(Update, |schedule| {
            schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        });

    reset_world(&mut app.world, seed);
    app
}

/// Execute a single simulation tick.
///
/// Runs the chained systems configured in [`build_headless_app`]
/// (regions → uplift → eruptions → lava → fire → vegetation → spawning →
/// telemetry → tick increment).
pub fn run_tick(app: &mut App) {
    app.update();
}
