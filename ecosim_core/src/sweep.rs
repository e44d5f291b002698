//! Parallel parameter sweeps over independent worlds.
//!
//! Each trial owns its own [`Ecosystem`], so workers share nothing but the
//! read-only base configuration and the cancel flag. Cancellation is
//! cooperative and only checked before a trial starts.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::{config::EcologyConfig, params::ParamKey, world::Ecosystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepBudget {
    pub max_ticks: u64,
    /// Abandon a trial once its digest has not changed for this many ticks.
    /// Zero disables the check.
    pub stagnation_ticks: u64,
}

impl Default for SweepBudget {
    fn default() -> Self {
        Self {
            max_ticks: 600,
            stagnation_ticks: 50,
        }
    }
}

/// One point in the sweep: a seed plus parameter overrides by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepTrial {
    pub id: usize,
    pub seed: u64,
    pub overrides: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Completed,
    Stagnated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialOutcome {
    pub id: usize,
    pub seed: u64,
    pub overrides: Vec<(String, f64)>,
    pub status: TrialStatus,
    pub ticks: u64,
    pub mean_lava_tiles: f64,
    pub mean_burning: f64,
    pub mean_vegetated: f64,
    pub peak_lava_tiles: u32,
    pub eruptions: u64,
    pub final_digest: u64,
}

/// A swept parameter: `steps` evenly spaced values from `min` to `max`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepAxis {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub steps: u32,
}

#[derive(Debug, Error, PartialEq)]
pub enum SweepAxisError {
    #[error("expected key=min:max:steps, got `{0}`")]
    Malformed(String),
    #[error("unknown parameter `{0}`")]
    UnknownParam(String),
    #[error("invalid number `{0}`")]
    Number(String),
}

impl SweepAxis {
    /// Parse `key=min:max:steps`.
    pub fn parse(text: &str) -> Result<Self, SweepAxisError> {
        let malformed = || SweepAxisError::Malformed(text.to_string());
        let (name, range) = text.split_once('=').ok_or_else(malformed)?;
        let name = name.trim();
        if ParamKey::from_name(name).is_none() {
            return Err(SweepAxisError::UnknownParam(name.to_string()));
        }
        let parts: Vec<&str> = range.split(':').map(str::trim).collect();
        let [min, max, steps] = parts.as_slice() else {
            return Err(malformed());
        };
        let number = |s: &str| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| SweepAxisError::Number(s.to_string()))
        };
        let steps = steps
            .parse::<u32>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| SweepAxisError::Number(steps.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            min: number(*min)?,
            max: number(*max)?,
            steps,
        })
    }

    pub fn values(&self) -> Vec<f64> {
        if self.steps <= 1 {
            return vec![self.min];
        }
        let last = (self.steps - 1) as f64;
        (0..self.steps)
            .map(|i| self.min + (self.max - self.min) * i as f64 / last)
            .collect()
    }
}

/// Cartesian product of every axis, repeated for each seed.
pub fn expand_trials(seeds: &[u64], axes: &[SweepAxis]) -> Vec<SweepTrial> {
    let mut combos: Vec<Vec<(String, f64)>> = vec![Vec::new()];
    for axis in axes {
        let values = axis.values();
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |value| {
                    let mut next = combo.clone();
                    next.push((axis.name.clone(), *value));
                    next
                })
            })
            .collect();
    }
    let mut trials = Vec::with_capacity(combos.len() * seeds.len());
    for overrides in &combos {
        for &seed in seeds {
            trials.push(SweepTrial {
                id: trials.len(),
                seed,
                overrides: overrides.clone(),
            });
        }
    }
    trials
}

/// Run every trial on the rayon pool and return outcomes in trial order.
/// Trials not yet started when `cancel` is raised are skipped.
pub fn run_sweep(
    base: &EcologyConfig,
    trials: &[SweepTrial],
    budget: SweepBudget,
    cancel: &AtomicBool,
) -> Vec<TrialOutcome> {
    trials
        .par_iter()
        .filter_map(|trial| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            Some(run_trial(base, trial, budget))
        })
        .collect()
}

pub fn run_trial(base: &EcologyConfig, trial: &SweepTrial, budget: SweepBudget) -> TrialOutcome {
    let mut config = base.clone().with_seed(trial.seed);
    for (name, value) in &trial.overrides {
        if config.params.set_by_name(name, *value).is_none() {
            tracing::warn!(target: "ecosim::sweep", param = %name, "sweep.unknown_param");
        }
    }
    tracing::info!(target: "ecosim::sweep", id = trial.id, seed = trial.seed, "sweep.trial_started");

    let mut world = Ecosystem::new(config);
    let mut lava_sum = 0u64;
    let mut burning_sum = 0u64;
    let mut vegetated_sum = 0u64;
    let mut peak_lava_tiles = 0u32;
    let mut last_digest = world.state_digest();
    let mut unchanged = 0u64;
    let mut status = TrialStatus::Completed;

    while world.tick() < budget.max_ticks {
        world.step();
        let telemetry = world.telemetry();
        lava_sum += telemetry.lava.tiles as u64;
        burning_sum += telemetry.burning as u64;
        vegetated_sum += telemetry.vegetation.vegetated() as u64;
        peak_lava_tiles = peak_lava_tiles.max(telemetry.lava.tiles);

        if budget.stagnation_ticks > 0 {
            let digest = world.state_digest();
            if digest == last_digest {
                unchanged += 1;
                if unchanged >= budget.stagnation_ticks {
                    status = TrialStatus::Stagnated;
                    break;
                }
            } else {
                unchanged = 0;
                last_digest = digest;
            }
        }
    }

    let ticks = world.tick();
    let per_tick = |sum: u64| if ticks == 0 { 0.0 } else { sum as f64 / ticks as f64 };
    let outcome = TrialOutcome {
        id: trial.id,
        seed: trial.seed,
        overrides: trial.overrides.clone(),
        status,
        ticks,
        mean_lava_tiles: per_tick(lava_sum),
        mean_burning: per_tick(burning_sum),
        mean_vegetated: per_tick(vegetated_sum),
        peak_lava_tiles,
        eruptions: world.telemetry().eruptions_total,
        final_digest: world.state_digest(),
    };
    tracing::info!(
        target: "ecosim::sweep",
        id = outcome.id,
        ticks = outcome.ticks,
        status = ?outcome.status,
        "sweep.trial_finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_parsing() {
        let axis = SweepAxis::parse("fire_spread_chance=0.1:0.3:3").unwrap();
        assert_eq!(axis.steps, 3);
        let values = axis.values();
        assert_eq!(values.len(), 3);
        assert!((values[1] - 0.2).abs() < 1e-9);
        assert_eq!(
            SweepAxis::parse("nope=0:1:2"),
            Err(SweepAxisError::UnknownParam("nope".into()))
        );
        assert!(matches!(
            SweepAxis::parse("fire_spread_chance=0:1"),
            Err(SweepAxisError::Malformed(_))
        ));
        assert!(matches!(
            SweepAxis::parse("fire_spread_chance=0:x:2"),
            Err(SweepAxisError::Number(_))
        ));
    }

    #[test]
    fn expansion_is_cartesian() {
        let axes = [
            SweepAxis::parse("fire_spread_chance=0:1:2").unwrap(),
            SweepAxis::parse("fire_burn_ticks=2:6:3").unwrap(),
        ];
        let trials = expand_trials(&[1, 2], &axes);
        assert_eq!(trials.len(), 12);
        assert!(trials.iter().enumerate().all(|(i, t)| t.id == i));
        assert_eq!(trials[0].overrides.len(), 2);
        assert!(expand_trials(&[7], &[]).len() == 1);
    }

    #[test]
    fn sweep_runs_independent_trials() {
        let base = EcologyConfig::new(16, 16, 0);
        let trials = expand_trials(&[3, 3, 4], &[]);
        let budget = SweepBudget {
            max_ticks: 20,
            stagnation_ticks: 0,
        };
        let outcomes = run_sweep(&base, &trials, budget, &AtomicBool::new(false));
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.ticks == 20));
        assert_eq!(outcomes[0].final_digest, outcomes[1].final_digest);
        assert_eq!(outcomes[2].id, 2);
    }

    #[test]
    fn cancelled_sweep_skips_trials() {
        let base = EcologyConfig::new(16, 16, 0);
        let trials = expand_trials(&[1, 2], &[]);
        let outcomes = run_sweep(&base, &trials, SweepBudget::default(), &AtomicBool::new(true));
        assert!(outcomes.is_empty());
    }

    #[test]
    fn frozen_world_stagnates() {
        let mut base = EcologyConfig::new(16, 16, 0);
        for key in ParamKey::ALL {
            let spec = key.spec();
            if spec.name.ends_with("_chance") {
                base.params.set_by_name(spec.name, 0.0);
            }
        }
        let trial = SweepTrial {
            id: 0,
            seed: 5,
            overrides: Vec::new(),
        };
        let outcome = run_trial(
            &base,
            &trial,
            SweepBudget {
                max_ticks: 500,
                stagnation_ticks: 5,
            },
        );
        assert_eq!(outcome.status, TrialStatus::Stagnated);
        assert!(outcome.ticks < 500);
    }
}
