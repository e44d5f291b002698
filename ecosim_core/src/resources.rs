use bevy::prelude::*;
use bitflags::bitflags;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tracks total simulation ticks elapsed since the last reset.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationTick(pub u64);

/// The single seeded stream every stochastic phase draws from, in pipeline order.
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub ChaCha8Rng);

impl SimRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

bitflags! {
    /// Pipeline phases that can be switched off for experiments and tests.
    #[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EcologyPhases: u8 {
        const RAIN = 1 << 0;
        const VOLCANO = 1 << 1;
        const LAVA = 1 << 2;
        const FIRE = 1 << 3;
        const VEGETATION = 1 << 4;
    }
}

impl Default for EcologyPhases {
    fn default() -> Self {
        Self::all()
    }
}

/// Run condition for systems gated on a phase flag.
pub fn phase_enabled(flag: EcologyPhases) -> impl FnMut(Res<EcologyPhases>) -> bool + Clone {
    move |phases: Res<EcologyPhases>| phases.contains(flag)
}

/// A proto-volcano that expired this tick and awaits its eruption roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingEruption {
    pub center: Vec2,
    pub radius: f32,
    pub mean_mask: f32,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct EruptionQueue(pub Vec<PendingEruption>);

/// Per-tick counters written by the phases and folded into telemetry.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseStats {
    pub lava_advanced: u32,
    pub lava_splits: u32,
    pub lava_pooled: u32,
    pub lava_solidified: u32,
    pub lava_injected: u32,
    pub eruptions_triggered: u32,
    pub eruptions_fizzled: u32,
    pub ignitions: u32,
    pub extinguished: u32,
    pub uplifted: u32,
}

impl PhaseStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn all_phases_enabled_by_default() {
        let phases = EcologyPhases::default();
        assert!(phases.contains(EcologyPhases::RAIN | EcologyPhases::LAVA));
        assert!(!(phases - EcologyPhases::RAIN).contains(EcologyPhases::RAIN));
    }

    #[test]
    fn rng_stream_is_seeded() {
        let mut a = SimRng::from_seed(4);
        let mut b = SimRng::from_seed(4);
        let xs: Vec<u32> = (0..8).map(|_| a.0.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.0.gen()).collect();
        assert_eq!(xs, ys);
    }
}
