use bevy::{ecs::system::RunSystemOnce, prelude::*};

use crate::{
    build_headless_app,
    cell::{CellState, Direction, Ground, Vegetation},
    config::{EcologyConfig, EcologyParams, ParamKey, ParamSpec},
    fire,
    grid::{EcologyGrid, GridDims},
    hashing,
    lava::{LavaField, LavaVent},
    metrics::EcologyTelemetry,
    rain::{RainRegion, RainRegions},
    regions::{RegionMasks, VolcanoProtoRegion, VolcanoRegions},
    resources::{EcologyPhases, SimulationTick},
    run_tick,
    systems::{debug_erupt_at, reset_world},
};

/// Owning handle over one simulated world.
///
/// Wraps the headless [`App`] and exposes lifecycle control, read-only
/// layer access for renderers, debug mutators and live parameter tuning.
pub struct Ecosystem {
    app: App,
}

impl Ecosystem {
    pub fn new(config: EcologyConfig) -> Self {
        Self {
            app: build_headless_app(config),
        }
    }

    /// Regenerate the world from `seed`. Parameters and phase flags persist.
    pub fn reset(&mut self, seed: u64) {
        reset_world(&mut self.app.world, seed);
    }

    pub fn step(&mut self) {
        run_tick(&mut self.app);
    }

    pub fn step_n(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    pub fn tick(&self) -> u64 {
        self.app.world.resource::<SimulationTick>().0
    }

    pub fn config(&self) -> &EcologyConfig {
        self.app.world.resource::<EcologyConfig>()
    }

    pub fn params(&self) -> &EcologyParams {
        &self.config().params
    }

    pub fn dims(&self) -> GridDims {
        self.grid().dims
    }

    pub fn grid(&self) -> &EcologyGrid {
        self.app.world.resource::<EcologyGrid>()
    }

    pub fn lava(&self) -> &LavaField {
        self.app.world.resource::<LavaField>()
    }

    fn masks(&self) -> &RegionMasks {
        self.app.world.resource::<RegionMasks>()
    }

    pub fn ground(&self) -> &[Ground] {
        self.grid().ground.current()
    }

    pub fn vegetation(&self) -> &[Vegetation] {
        self.grid().vegetation.current()
    }

    pub fn burn_ttl(&self) -> &[u16] {
        self.grid().burn_ttl.current()
    }

    pub fn tectonic_baseline(&self) -> &[f32] {
        &self.grid().tectonic_baseline
    }

    pub fn lava_height(&self) -> &[u8] {
        self.lava().height.current()
    }

    pub fn lava_temperature(&self) -> &[f32] {
        self.lava().temperature.current()
    }

    pub fn lava_direction(&self) -> &[Option<Direction>] {
        self.lava().direction.current()
    }

    pub fn lava_tip(&self) -> &[bool] {
        self.lava().tip.current()
    }

    pub fn lava_forced(&self) -> &[bool] {
        self.lava().forced.current()
    }

    pub fn lava_channel(&self) -> &[f32] {
        self.lava().channel.current()
    }

    pub fn lava_elevation(&self) -> &[i16] {
        &self.lava().elevation
    }

    pub fn vents(&self) -> &[LavaVent] {
        &self.lava().vents
    }

    pub fn rain_mask(&self) -> &[f32] {
        self.masks().rain.current()
    }

    pub fn volcano_mask(&self) -> &[f32] {
        self.masks().volcano.current()
    }

    pub fn rain_regions(&self) -> &[RainRegion] {
        &self.app.world.resource::<RainRegions>().0
    }

    pub fn volcano_regions(&self) -> &[VolcanoProtoRegion] {
        &self.app.world.resource::<VolcanoRegions>().0
    }

    pub fn cell_state(&self, x: i32, y: i32) -> Option<CellState> {
        let grid = self.grid();
        grid.dims.index(x, y).and_then(|idx| grid.cell_state(idx))
    }

    /// Set a vegetated cell alight. Returns `false` when out of bounds,
    /// bare or already burning.
    pub fn ignite_at(&mut self, x: i32, y: i32) -> bool {
        let params = self.config().params.clone();
        let mut grid = self.app.world.resource_mut::<EcologyGrid>();
        match grid.dims.index(x, y) {
            Some(idx) => fire::ignite(&mut grid, idx, &params),
            None => false,
        }
    }

    /// Force an eruption at a cell now instead of waiting on a proto-volcano.
    pub fn spawn_volcano_at(&mut self, x: i32, y: i32) -> bool {
        self.app.world.run_system_once_with((x, y), debug_erupt_at)
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        ParamKey::from_name(name).map(|key| self.params().get(key).as_f64())
    }

    pub fn param_float(&self, name: &str) -> Option<f32> {
        ParamKey::from_name(name).map(|key| self.params().get_float(key))
    }

    pub fn param_int(&self, name: &str) -> Option<i64> {
        ParamKey::from_name(name).map(|key| self.params().get_int(key))
    }

    /// Clamp and store a float parameter. Unknown names report no change.
    pub fn set_param_float(&mut self, name: &str, value: f32) -> bool {
        let Some(key) = ParamKey::from_name(name) else {
            return false;
        };
        self.config_mut().params.set_float(key, value)
    }

    /// Round, clamp and store an integer parameter. Unknown names report no change.
    pub fn set_param_int(&mut self, name: &str, value: i64) -> bool {
        let Some(key) = ParamKey::from_name(name) else {
            return false;
        };
        self.config_mut().params.set_int(key, value)
    }

    pub fn param_table(&self) -> Vec<ParamSpec> {
        ParamKey::table()
    }

    fn config_mut(&mut self) -> Mut<'_, EcologyConfig> {
        self.app.world.resource_mut::<EcologyConfig>()
    }

    pub fn phases(&self) -> EcologyPhases {
        *self.app.world.resource::<EcologyPhases>()
    }

    pub fn set_phases(&mut self, phases: EcologyPhases) {
        self.app.world.insert_resource(phases);
    }

    pub fn telemetry(&self) -> &EcologyTelemetry {
        self.app.world.resource::<EcologyTelemetry>()
    }

    pub fn state_digest(&self) -> u64 {
        hashing::state_digest(
            self.grid(),
            self.lava(),
            self.rain_regions(),
            self.volcano_regions(),
            self.rain_mask(),
            self.volcano_mask(),
        )
    }

    /// Direct access to the terrain for scenario setup.
    pub fn grid_mut(&mut self) -> Mut<'_, EcologyGrid> {
        self.app.world.resource_mut::<EcologyGrid>()
    }

    pub fn lava_mut(&mut self) -> Mut<'_, LavaField> {
        self.app.world.resource_mut::<LavaField>()
    }

    pub fn rain_regions_mut(&mut self) -> Mut<'_, RainRegions> {
        self.app.world.resource_mut::<RainRegions>()
    }

    pub fn volcano_regions_mut(&mut self) -> Mut<'_, VolcanoRegions> {
        self.app.world.resource_mut::<VolcanoRegions>()
    }

    /// Rebuild the lava elevation raster after editing the terrain directly.
    pub fn refresh_elevation(&mut self) {
        self.app
            .world
            .resource_scope(|world, mut lava: Mut<LavaField>| {
                lava.reset_elevation(world.resource::<EcologyGrid>());
            });
    }
}

impl Default for Ecosystem {
    fn default() -> Self {
        Self::new(EcologyConfig::default())
    }
}
