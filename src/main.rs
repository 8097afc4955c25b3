// src/main.rs

use anyhow::{Context, Result};
use inventory_gym::io::{demand, reporting};
use inventory_gym::simulation::runner::{test_agent, HistoryRecord};
use inventory_gym::strategy::implementations::{BaseStockPolicy, ConstantPolicy, SaaPolicy};
use inventory_gym::strategy::processors::{ClipAction, ConvertDictSpace, RoundAction};
use inventory_gym::{
    DataLoader, HorizonTrain, InventoryEnvironment, LeadTime, MultiPeriodConfig, MultiPeriodEnv,
    NewsvendorConfig, NewsvendorEnv, ObservationProcessor, ParamInput, PipelineConfig, Policy,
    Regime, StartIndex, XYDataLoader,
};
use log::info;
use ndarray::array;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::rc::Rc;

const PERIODS: usize = 365;
const VAL_START: usize = 250;
const TEST_START: usize = 310;
const OUTPUT_DIR: &str = "results";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== Inventory control environments ===");

    // 1. GENERATE DATA
    // Two products: a high-margin one with volatile demand and a steady one.
    let mean = array![20.0, 50.0];
    let std_dev = array![6.0, 5.0];
    let mut rng = StdRng::seed_from_u64(42);
    let y = demand::generate_normal_demand(PERIODS, &mean, &std_dev, &mut rng)?;
    let x = demand::weekday_features(PERIODS);
    let loader = Rc::new(XYDataLoader::new(x, y, Some(VAL_START), Some(TEST_START))?);
    let shared: Rc<dyn DataLoader> = loader.clone();
    info!(
        "Training features: {:?}",
        loader.get_all_x(Some(Regime::Train))?.shape()
    );

    fs::create_dir_all(OUTPUT_DIR).context("creating output directory")?;

    // 2. NEWSVENDOR: SAA against a naive mean-demand order
    let underage_cost = array![4.0, 2.0];
    let overage_cost = array![1.0, 1.0];
    let config = NewsvendorConfig {
        underage_cost: ParamInput::from(underage_cost.clone()),
        overage_cost: ParamInput::from(overage_cost.clone()),
        seed: Some(1),
        ..NewsvendorConfig::default()
    };
    let mut env = NewsvendorEnv::from_config(shared.clone(), &config)?;

    let mut saa = SaaPolicy::new(loader.num_units());
    saa.fit_loader(&loader, underage_cost.view(), overage_cost.view())?;
    let mut naive = ConstantPolicy::new(mean.clone());

    let mut history: Vec<HistoryRecord> = Vec::new();
    for regime in [Regime::Val, Regime::Test] {
        for policy in [&mut saa as &mut dyn Policy, &mut naive] {
            let (score, episode) = test_agent(&mut env, policy, regime)?;
            info!(
                "Newsvendor | {:<8} | {:<4} | R = {:>10.2} | J = {:>10.2}",
                policy.name(),
                regime,
                score.total,
                score.discounted
            );
            history.extend(episode.history);
        }
    }
    reporting::write_history(format!("{}/newsvendor.csv", OUTPUT_DIR), &history)?;

    // 3. MULTI-PERIOD: base stock with a two period lead time
    let holding_cost = array![1.0, 1.0];
    let config = MultiPeriodConfig {
        underage_cost: ParamInput::from(underage_cost.clone()),
        holding_cost: ParamInput::from(holding_cost.clone()),
        pipeline: PipelineConfig::fixed(2),
        horizon_train: HorizonTrain::Fixed(50),
        seed: Some(1),
        ..MultiPeriodConfig::default()
    };
    let mut env = MultiPeriodEnv::from_config(shared, &config)?
        .with_postprocessor(ClipAction::scalar(Some(0.0), None))
        .with_postprocessor(RoundAction::scalar(1.0)?);

    let lead_times = env.dynamics().pipeline().lead_times().to_vec();
    let mut base_stock = BaseStockPolicy::with_optimal_target(
        underage_cost.view(),
        holding_cost.view(),
        mean.view(),
        std_dev.view(),
        &lead_times,
    );

    let mut history: Vec<HistoryRecord> = Vec::new();
    for regime in [Regime::Val, Regime::Test] {
        let (score, episode) = test_agent(&mut env, &mut base_stock, regime)?;
        info!(
            "Multi-period | base_stock | {:<4} | R = {:>10.2} | J = {:>10.2}",
            regime, score.total, score.discounted
        );
        history.extend(episode.history);
    }
    info!(
        "Still in transit after the test episode: {}",
        env.dynamics().pipeline().in_transit()
    );
    reporting::write_history(format!("{}/multi_period.csv", OUTPUT_DIR), &history)?;

    // Same policy on demand fixed at its mean: the cost of no uncertainty.
    let constant_loader = XYDataLoader::new(
        demand::weekday_features(PERIODS),
        demand::generate_constant_demand(PERIODS, &mean),
        Some(VAL_START),
        Some(TEST_START),
    )?;
    let mut env = MultiPeriodEnv::from_config(Rc::new(constant_loader), &config)?;
    let (score, _) = test_agent(&mut env, &mut base_stock, Regime::Test)?;
    info!("Multi-period | constant demand | R = {:>10.2}", score.total);

    // Random lead times are drawn once per product at construction.
    let config = MultiPeriodConfig {
        pipeline: PipelineConfig {
            lead_time: LeadTime::Uniform { low: 1, high: 3 },
            max_lead_time: Some(3),
        },
        seed: Some(7),
        ..config
    };
    let step_loader = XYDataLoader::new(
        demand::weekday_features(PERIODS),
        demand::generate_step_demand(PERIODS, VAL_START, 20.0, 30.0, 2),
        Some(VAL_START),
        Some(TEST_START),
    )?;
    let mut env = MultiPeriodEnv::from_config(Rc::new(step_loader), &config)?;
    info!(
        "Drawn lead times per product: {:?}",
        env.dynamics().pipeline().lead_times()
    );
    let observation = env.reset(StartIndex::Auto)?;
    info!(
        "Flat model input per observation: {:?}",
        ConvertDictSpace::default().output_shape(&observation)?
    );

    info!("Simulation complete. Reports written to ./{}", OUTPUT_DIR);
    Ok(())
}
