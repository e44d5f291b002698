//! Typed, enumerable tuning table.
//!
//! Every parameter is a plain struct field on [`EcologyParams`] for the
//! simulation code, and a [`ParamKey`] with a [`ParamSpec`] for generic
//! tooling (live tuning panels, sweeps, config files). Writes through the
//! table clamp to the declared range and report whether anything changed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    Float,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ParamValue {
    Float(f32),
    Int(u32),
}

impl ParamValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ParamValue::Float(v) => v as f64,
            ParamValue::Int(v) => v as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    #[serde(skip)]
    pub key: ParamKey,
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

trait ParamSlot: Copy + PartialEq {
    const KIND: ParamKind;
    fn to_value(self) -> ParamValue;
    fn from_clamped(value: f64, min: f64, max: f64) -> Self;
}

impl ParamSlot for f32 {
    const KIND: ParamKind = ParamKind::Float;

    fn to_value(self) -> ParamValue {
        ParamValue::Float(self)
    }

    fn from_clamped(value: f64, min: f64, max: f64) -> Self {
        value.clamp(min, max) as f32
    }
}

impl ParamSlot for u32 {
    const KIND: ParamKind = ParamKind::Int;

    fn to_value(self) -> ParamValue {
        ParamValue::Int(self)
    }

    fn from_clamped(value: f64, min: f64, max: f64) -> Self {
        value.round().clamp(min, max) as u32
    }
}

macro_rules! ecology_params {
    ($(
        $(#[$meta:meta])*
        $variant:ident => $field:ident: $ty:ty = $default:expr, [$min:expr, $max:expr];
    )+) => {
        /// Every tunable of the simulation, each independently defaulted and clamped.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct EcologyParams {
            $(
                $(#[$meta])*
                pub $field: $ty,
            )+
        }

        impl Default for EcologyParams {
            fn default() -> Self {
                Self {
                    $( $field: $default, )+
                }
            }
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ParamKey {
            $( $variant, )+
        }

        impl ParamKey {
            pub const ALL: &'static [ParamKey] = &[ $( ParamKey::$variant, )+ ];

            pub fn spec(self) -> ParamSpec {
                match self {
                    $(
                        ParamKey::$variant => ParamSpec {
                            key: self,
                            name: stringify!($field),
                            kind: <$ty as ParamSlot>::KIND,
                            min: $min as f64,
                            max: $max as f64,
                            default: $default as f64,
                        },
                    )+
                }
            }
        }

        impl EcologyParams {
            pub fn get(&self, key: ParamKey) -> ParamValue {
                match key {
                    $( ParamKey::$variant => ParamSlot::to_value(self.$field), )+
                }
            }

            fn write(&mut self, key: ParamKey, value: f64) -> bool {
                match key {
                    $(
                        ParamKey::$variant => {
                            let next = <$ty as ParamSlot>::from_clamped(value, $min as f64, $max as f64);
                            let changed = next != self.$field;
                            self.$field = next;
                            changed
                        }
                    )+
                }
            }
        }
    };
}

ecology_params! {
    // Initial terrain
    RockFraction => rock_fraction: f32 = 0.08, [0.0, 1.0];
    GrassPatchCount => grass_patch_count: u32 = 14, [0, 512];
    GrassPatchRadius => grass_patch_radius: u32 = 4, [1, 64];
    TectonicNoiseScale => tectonic_noise_scale: f32 = 0.035, [0.001, 1.0];

    // Rain regions
    RainMaxRegions => rain_max_regions: u32 = 6, [0, 64];
    RainSpawnChance => rain_spawn_chance: f32 = 0.04, [0.0, 1.0];
    RainRadiusMin => rain_radius_min: f32 = 10.0, [1.0, 256.0];
    RainRadiusMax => rain_radius_max: f32 = 26.0, [1.0, 256.0];
    RainTtlMin => rain_ttl_min: u32 = 120, [1, 10_000];
    RainTtlMax => rain_ttl_max: u32 = 360, [1, 10_000];
    /// Largest per-tick displacement of a cloud centre, in cells.
    RainMaxDrift => rain_max_drift: f32 = 0.6, [0.0, 8.0];
    RainFlowScale => rain_flow_scale: f32 = 0.02, [0.0005, 1.0];
    /// Advance of the flow potential's time axis per tick.
    RainPhaseRate => rain_phase_rate: f32 = 0.004, [0.0, 0.5];
    RainCohesionRadius => rain_cohesion_radius: f32 = 30.0, [0.0, 512.0];
    RainCohesion => rain_cohesion: f32 = 0.35, [0.0, 1.0];
    /// Fraction of the smaller cloud's area that must overlap before a merge.
    RainMergeOverlap => rain_merge_overlap: f32 = 0.15, [0.01, 1.0];
    RainNoiseScale => rain_noise_scale: f32 = 0.08, [0.001, 1.0];
    RainNoiseThreshold => rain_noise_threshold: f32 = 0.45, [0.0, 1.0];
    RainNoiseSoftness => rain_noise_softness: f32 = 0.12, [0.001, 0.5];
    /// Normalised radius inside which a cloud is fully opaque.
    RainCoreRadius => rain_core_radius: f32 = 0.3, [0.0, 1.0];
    RainMinIslandArea => rain_min_island_area: u32 = 12, [0, 4096];
    RainCoverageSoftCap => rain_coverage_soft_cap: f32 = 0.15, [0.0, 1.0];
    RainFadeTicks => rain_fade_ticks: u32 = 30, [0, 1000];

    // Proto-volcanoes and eruptions
    VolcanoMaxRegions => volcano_max_regions: u32 = 2, [0, 16];
    VolcanoSpawnChance => volcano_spawn_chance: f32 = 0.008, [0.0, 1.0];
    VolcanoRadiusMin => volcano_radius_min: f32 = 5.0, [1.0, 128.0];
    VolcanoRadiusMax => volcano_radius_max: f32 = 11.0, [1.0, 128.0];
    VolcanoTtlMin => volcano_ttl_min: u32 = 80, [1, 10_000];
    VolcanoTtlMax => volcano_ttl_max: u32 = 200, [1, 10_000];
    UpliftBase => uplift_base: f32 = 0.02, [0.0, 1.0];
    EruptBase => erupt_base: f32 = 2.5, [0.0, 8.0];
    VentCountMin => vent_count_min: u32 = 1, [1, 8];
    VentCountMax => vent_count_max: u32 = 3, [1, 8];
    VentMassMin => vent_mass_min: u32 = 80, [1, 100_000];
    VentMassMax => vent_mass_max: u32 = 160, [1, 100_000];
    /// Height units a vent injects per tick.
    VentGain => vent_gain: u32 = 1, [1, 7];
    ElevationSlope => elevation_slope: f32 = 1.5, [0.0, 16.0];
    ElevationJitter => elevation_jitter: u32 = 1, [0, 16];
    /// Cone radius as a multiple of the eruption radius.
    ElevationReach => elevation_reach: f32 = 3.0, [1.0, 16.0];

    // Lava advection
    LavaBaseSpeed => lava_base_speed: f32 = 0.85, [0.0, 1.0];
    LavaSpeedAlpha => lava_speed_alpha: f32 = 0.12, [0.0, 4.0];
    LavaOverflowHeight => lava_overflow_height: u32 = 5, [2, 7];
    LavaSlopeWeight => lava_slope_weight: f32 = 1.0, [0.0, 10.0];
    LavaAlignWeight => lava_align_weight: f32 = 0.6, [0.0, 10.0];
    LavaRainWeight => lava_rain_weight: f32 = 0.8, [0.0, 10.0];
    LavaChannelWeight => lava_channel_weight: f32 = 0.5, [0.0, 10.0];
    LavaWallWeight => lava_wall_weight: f32 = 0.8, [0.0, 10.0];
    LavaFlowThreshold => lava_flow_threshold: f32 = 0.15, [-5.0, 5.0];
    LavaSplitChance => lava_split_chance: f32 = 0.08, [0.0, 1.0];
    LavaSplitMinHeight => lava_split_min_height: u32 = 2, [1, 7];
    LavaSplitMargin => lava_split_margin: f32 = 0.2, [0.0, 5.0];
    /// Temperature factor a new tip keeps from its parent.
    LavaTipInherit => lava_tip_inherit: f32 = 0.995, [0.5, 1.0];
    LavaTipMinTemp => lava_tip_min_temp: f32 = 0.35, [0.0, 1.0];

    // Cooling and crusting
    CoolBase => cool_base: f32 = 0.002, [0.0001, 0.5];
    CoolEdge => cool_edge: f32 = 0.006, [0.0, 0.5];
    CoolRain => cool_rain: f32 = 0.03, [0.0, 1.0];
    CoolThick => cool_thick: f32 = 0.004, [0.0, 0.5];
    CoolFlux => cool_flux: f32 = 0.002, [0.0, 0.5];
    CrustThreshold => crust_threshold: f32 = 0.3, [0.0, 0.95];
    CrustReheat => crust_reheat: f32 = 0.38, [0.0, 1.0];
    ChannelGrow => channel_grow: f32 = 0.2, [0.0, 1.0];
    ChannelDecay => channel_decay: f32 = 0.01, [0.0, 1.0];

    // Fire
    FireBurnTicks => fire_burn_ticks: u32 = 6, [1, 1000];
    FireSpreadChance => fire_spread_chance: f32 = 0.22, [0.0, 1.0];
    FireRainDampen => fire_rain_dampen: f32 = 0.9, [0.0, 1.0];
    FireRainExtinguish => fire_rain_extinguish: f32 = 0.35, [0.0, 1.0];
    LavaIgniteChance => lava_ignite_chance: f32 = 0.6, [0.0, 1.0];

    // Vegetation succession
    GrassGrowthChance => grass_growth_chance: f32 = 0.05, [0.0, 1.0];
    GrassNeighborMin => grass_neighbor_min: u32 = 1, [0, 8];
    ShrubGrowthChance => shrub_growth_chance: f32 = 0.01, [0.0, 1.0];
    ShrubNeighborMin => shrub_neighbor_min: u32 = 3, [0, 8];
    TreeGrowthChance => tree_growth_chance: f32 = 0.004, [0.0, 1.0];
    TreeNeighborMin => tree_neighbor_min: u32 = 3, [0, 8];
    GrassSeedChance => grass_seed_chance: f32 = 0.00002, [0.0, 1.0];
    RainGrowthBoost => rain_growth_boost: f32 = 1.0, [0.0, 10.0];
    RockWeatheringChance => rock_weathering_chance: f32 = 0.0005, [0.0, 1.0];
}

impl ParamKey {
    pub fn from_name(name: &str) -> Option<ParamKey> {
        ParamKey::ALL
            .iter()
            .copied()
            .find(|key| key.spec().name == name)
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn table() -> Vec<ParamSpec> {
        ParamKey::ALL.iter().map(|key| key.spec()).collect()
    }
}

impl EcologyParams {
    /// Clamp-on-write float setter. Non-finite values are ignored.
    pub fn set_float(&mut self, key: ParamKey, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.write(key, value as f64)
    }

    /// Clamp-on-write integer setter.
    pub fn set_int(&mut self, key: ParamKey, value: i64) -> bool {
        self.write(key, value as f64)
    }

    pub fn get_float(&self, key: ParamKey) -> f32 {
        self.get(key).as_f64() as f32
    }

    pub fn get_int(&self, key: ParamKey) -> i64 {
        self.get(key).as_f64().round() as i64
    }

    /// Apply a value by parameter name; `None` when the name is unknown.
    pub fn set_by_name(&mut self, name: &str, value: f64) -> Option<bool> {
        let key = ParamKey::from_name(name)?;
        if !value.is_finite() {
            return Some(false);
        }
        Some(self.write(key, value))
    }

    /// Pull every field into its declared range.
    pub fn clamp_all(&mut self) {
        for &key in ParamKey::ALL {
            let value = self.get(key).as_f64();
            self.write(key, value);
        }
    }
}

/// Order a configured `(min, max)` pair that may have been set inverted.
pub fn span<T: PartialOrd + Copy>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_and_resolvable() {
        let mut seen = HashSet::new();
        for &key in ParamKey::ALL {
            let name = key.name();
            assert!(seen.insert(name), "duplicate parameter name {name}");
            assert_eq!(ParamKey::from_name(name), Some(key));
        }
        assert!(ParamKey::ALL.len() >= 60);
        assert_eq!(ParamKey::from_name("no_such_param"), None);
    }

    #[test]
    fn defaults_sit_inside_their_ranges() {
        let params = EcologyParams::default();
        for spec in ParamKey::table() {
            let value = params.get(spec.key).as_f64();
            assert!(
                value >= spec.min && value <= spec.max,
                "{} default {} outside [{}, {}]",
                spec.name,
                value,
                spec.min,
                spec.max
            );
            assert_eq!(value, spec.default as f32 as f64);
        }
    }

    #[test]
    fn setters_clamp_and_report_change() {
        let mut params = EcologyParams::default();
        assert!(params.set_float(ParamKey::FireSpreadChance, 4.0));
        assert_eq!(params.fire_spread_chance, 1.0);
        assert!(!params.set_float(ParamKey::FireSpreadChance, 2.0));
        assert!(!params.set_float(ParamKey::FireSpreadChance, f32::NAN));
        assert_eq!(params.fire_spread_chance, 1.0);

        assert!(params.set_int(ParamKey::LavaOverflowHeight, 99));
        assert_eq!(params.lava_overflow_height, 7);
        assert!(params.set_int(ParamKey::LavaOverflowHeight, -3));
        assert_eq!(params.lava_overflow_height, 2);
    }

    #[test]
    fn int_params_round_float_writes() {
        let mut params = EcologyParams::default();
        assert_eq!(params.set_by_name("fire_burn_ticks", 9.6), Some(true));
        assert_eq!(params.fire_burn_ticks, 10);
        assert_eq!(params.get_int(ParamKey::FireBurnTicks), 10);
        assert_eq!(params.set_by_name("bogus", 1.0), None);
    }

    #[test]
    fn clamp_all_repairs_loaded_values() {
        let mut params = EcologyParams {
            rain_spawn_chance: 3.0,
            cool_base: 0.0,
            vent_gain: 40,
            ..EcologyParams::default()
        };
        params.clamp_all();
        assert_eq!(params.rain_spawn_chance, 1.0);
        assert_eq!(params.cool_base, 0.0001);
        assert_eq!(params.vent_gain, 7);
    }

    #[test]
    fn span_orders_inverted_ranges() {
        assert_eq!(span(5.0, 2.0), (2.0, 5.0));
        assert_eq!(span(1u32, 3), (1, 3));
    }
}
