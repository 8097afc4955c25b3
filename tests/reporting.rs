// tests/reporting.rs

use inventory_gym::io::reporting::write_history;
use inventory_gym::simulation::runner::test_agent;
use inventory_gym::strategy::implementations::SaaPolicy;
use inventory_gym::{NewsvendorConfig, NewsvendorEnv, ParamInput, Regime, XYDataLoader};
use ndarray::{array, Array2};
use std::rc::Rc;
use tempdir::TempDir;

#[test]
fn evaluation_history_round_trips_through_csv() {
    let x = Array2::zeros((30, 1));
    let y = Array2::from_shape_fn((30, 2), |(i, u)| ((i % 5) + u) as f64);
    let loader = Rc::new(XYDataLoader::new(x, y, Some(20), Some(25)).unwrap());

    let config = NewsvendorConfig {
        underage_cost: ParamInput::Vector(vec![3.0, 1.0]),
        overage_cost: ParamInput::Scalar(1.0),
        ..NewsvendorConfig::default()
    };
    let mut env = NewsvendorEnv::from_config(loader.clone(), &config).unwrap();
    let mut policy = SaaPolicy::new(2);
    policy
        .fit_loader(&loader, array![3.0, 1.0].view(), array![1.0, 1.0].view())
        .unwrap();

    let (score, episode) = test_agent(&mut env, &mut policy, Regime::Test).unwrap();
    assert_eq!(episode.len(), 5);
    assert_eq!(episode.history.len(), 10);

    let dir = TempDir::new("inventory_gym").unwrap();
    let path = dir.path().join("test.csv");
    write_history(&path, &episode.history).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["step", "regime", "policy", "sku", "demand", "action", "cost", "reward"]
    );

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 10);
    assert_eq!(&rows[0][1], "test");
    assert_eq!(&rows[0][2], "saa");

    // every period's reward appears once per unit
    let total: f64 = rows
        .iter()
        .filter(|r| &r[3] == "0")
        .map(|r| r[7].parse::<f64>().unwrap())
        .sum();
    assert!((total - score.total).abs() < 1e-9);
}
