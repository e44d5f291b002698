use std::sync::atomic::AtomicBool;

use ecosim_core::sweep::{expand_trials, run_sweep, SweepAxis, SweepBudget, TrialStatus};
use ecosim_core::EcologyConfig;

#[test]
fn sweep_outcomes_are_ordered_and_reproducible() {
    let base = EcologyConfig::new(24, 24, 0);
    let axes = [SweepAxis::parse("fire_spread_chance=0.1:0.5:2").unwrap()];
    let trials = expand_trials(&[11, 11], &axes);
    let budget = SweepBudget {
        max_ticks: 30,
        stagnation_ticks: 0,
    };

    let outcomes = run_sweep(&base, &trials, budget, &AtomicBool::new(false));
    assert_eq!(outcomes.len(), 4);
    for (idx, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.id, idx);
        assert_eq!(outcome.status, TrialStatus::Completed);
        assert_eq!(outcome.ticks, 30);
    }
    assert_eq!(outcomes[0].final_digest, outcomes[1].final_digest);
    assert_eq!(outcomes[2].final_digest, outcomes[3].final_digest);

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[0]["status"], "completed");
    assert_eq!(json[2]["overrides"][0][0], "fire_spread_chance");
}
