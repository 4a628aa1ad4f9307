use lora_adaptation_simulator::common::scenario::{ScenarioFormat, load_scenario, parse_scenario};
use lora_adaptation_simulator::simulation::Network;
use lora_adaptation_simulator::strategy::StrategyConfig;

fn scenario_path(name: &str) -> String {
    format!("{}/scenarios/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn bundled_scenarios_load_and_run() {
    for name in ["static-adr-lite.toml", "mobile-tow-channels.json"] {
        let scenario = load_scenario(&scenario_path(name)).unwrap();
        let report = Network::run(&scenario).unwrap();
        assert!(report.metrics.attempted > 0, "{} sent nothing", name);
        assert!((0.0..=1.0).contains(&report.metrics.pdr));
        assert!(report.metrics.mean_energy_per_success_mj.is_finite());
        assert_eq!(report.devices.len(), scenario.devices.len());
        let ratio_sum: f64 = report.metrics.rank_selection_ratios.values().sum();
        assert!((ratio_sum - 1.0).abs() < 1e-9);
    }
}

#[test]
fn one_meter_link_always_delivers() {
    let data = r#"
seed = 1
duration-s = 3600.0

[axes]
spreading-factors = [7]
tx-powers-dbm = [14.0]

[gateway]
position = { x = 0.0, y = 0.0, z = 15.0 }

[[devices]]
id = 1
position = { x = 1.0, y = 0.0, z = 15.0 }
interval-s = 10.0
"#;
    let scenario = parse_scenario(data, ScenarioFormat::Toml).unwrap();
    let report = Network::run(&scenario).unwrap();
    assert!(report.metrics.attempted >= 359);
    assert_eq!(report.metrics.successful, report.metrics.attempted);
    assert_eq!(report.metrics.pdr, 1.0);
}

#[test]
fn every_strategy_runs_the_static_scenario() {
    let base = load_scenario(&scenario_path("static-adr-lite.toml")).unwrap();
    let strategies = [
        r#"{ "algorithm": "bisection" }"#,
        r#"{ "algorithm": "ucb1-tuned" }"#,
        r#"{ "algorithm": "ucb1-tuned", "reward": "inverse-airtime" }"#,
        r#"{ "algorithm": "epsilon-greedy", "epsilon": 0.2 }"#,
        r#"{ "algorithm": "oscillating-forgetting" }"#,
        r#"{ "algorithm": "fixed" }"#,
        r#"{ "algorithm": "fixed", "rank": 29 }"#,
        r#"{ "algorithm": "random" }"#,
        r#"{ "algorithm": "snr-target", "mode": "max" }"#,
        r#"{ "algorithm": "snr-target", "mode": "avg" }"#,
    ];
    for json in strategies {
        let mut scenario = base.clone();
        scenario.strategy = serde_json::from_str::<StrategyConfig>(json).unwrap();
        let report = Network::run(&scenario).unwrap();
        assert!(report.metrics.attempted > 0, "{}", json);
        assert!(!report.metrics.pdr.is_nan(), "{}", json);
    }
}

#[test]
fn most_robust_fixed_configuration_reaches_far_static_devices() {
    let mut scenario = load_scenario(&scenario_path("static-adr-lite.toml")).unwrap();
    scenario.gateway.shadowing_sigma_db = 0.0;
    scenario.strategy = serde_json::from_str(r#"{ "algorithm": "fixed", "rank": 29 }"#).unwrap();
    let robust = Network::run(&scenario).unwrap();

    scenario.strategy = serde_json::from_str(r#"{ "algorithm": "fixed", "rank": 0 }"#).unwrap();
    let cheap = Network::run(&scenario).unwrap();

    assert!(robust.metrics.pdr > cheap.metrics.pdr);
    assert!(robust.metrics.mean_energy_per_success_mj > cheap.metrics.mean_energy_per_success_mj);
}
