// tests/environment.rs

use inventory_gym::error::{DataError, EnvError};
use inventory_gym::strategy::processors::{ClipAction, RoundAction};
use inventory_gym::{
    DataLoader, DatasetView, HorizonTrain, InventoryEnvironment, LeadTime, MultiPeriodConfig,
    MultiPeriodEnv, NewsvendorConfig, NewsvendorEnv, OrderPipeline, ParamInput, ParamStore,
    PipelineConfig, Regime, StartIndex, XYDataLoader,
};
use ndarray::{array, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::rc::Rc;

fn loader(y: Array2<f64>, val: Option<usize>, test: Option<usize>) -> Rc<dyn DataLoader> {
    let x = Array2::from_shape_fn((y.nrows(), 2), |(i, j)| (i * 2 + j) as f64);
    Rc::new(XYDataLoader::new(x, y, val, test).unwrap())
}

#[test]
fn newsvendor_underage_example() {
    let config = NewsvendorConfig {
        underage_cost: ParamInput::Scalar(2.0),
        overage_cost: ParamInput::Scalar(1.0),
        ..NewsvendorConfig::default()
    };
    let mut env =
        NewsvendorEnv::from_config(loader(Array2::from_elem((3, 1), 10.0), None, None), &config)
            .unwrap();
    env.reset(StartIndex::At(0)).unwrap();
    let step = env.step(array![7.0].into_dyn()).unwrap();
    assert_eq!(step.reward, -6.0);
    assert_eq!(step.info.cost_per_sku, Some(array![6.0]));
    assert!(!step.terminated);
}

#[test]
fn fixed_horizon_truncates_on_fifth_call() {
    let config = NewsvendorConfig {
        horizon_train: HorizonTrain::Fixed(5),
        seed: Some(11),
        ..NewsvendorConfig::default()
    };
    let mut env =
        NewsvendorEnv::from_config(loader(Array2::ones((30, 1)), None, None), &config).unwrap();
    env.reset(StartIndex::At(0)).unwrap();
    let flags: Vec<Option<bool>> = (0..5)
        .map(|_| env.step(array![1.0].into_dyn()).unwrap().truncated)
        .collect();
    assert_eq!(
        flags,
        vec![Some(false), Some(false), Some(false), Some(false), Some(true)]
    );
}

#[test]
fn regime_switch_is_shared_with_dataset_view() {
    let data = loader(Array2::ones((40, 1)), Some(25), Some(35));
    let view = DatasetView::new(data.clone());
    let mut env = NewsvendorEnv::from_config(data, &NewsvendorConfig::default()).unwrap();
    assert_eq!(view.len().unwrap(), 25);

    env.val().unwrap();
    assert_eq!(view.regime(), Regime::Val);
    assert_eq!(view.len().unwrap(), 10);
    assert!(matches!(
        view.get(10),
        Err(DataError::IndexOutOfRange { index: 10, .. })
    ));

    env.train().unwrap();
    assert_eq!(view.len().unwrap(), 25);
    assert_eq!(env.dataloader().len_train(), 25);
    assert_eq!(env.start_index(), 0);
}

#[test]
fn random_start_only_in_training() {
    let config = NewsvendorConfig {
        horizon_train: HorizonTrain::Fixed(4),
        seed: Some(5),
        ..NewsvendorConfig::default()
    };
    let mut env = NewsvendorEnv::from_config(loader(Array2::ones((20, 1)), Some(10), None), &config)
        .unwrap();
    for _ in 0..10 {
        env.reset(StartIndex::Random).unwrap();
        assert!(env.start_index() < 10 - 4);
    }
    env.val().unwrap();
    assert!(matches!(
        env.reset(StartIndex::Random),
        Err(EnvError::RandomStartOutsideTrain(Regime::Val))
    ));
}

#[test]
fn multi_period_inventory_stays_within_bounds() {
    let mut rng = StdRng::seed_from_u64(99);
    let demand = Array2::from_shape_fn((60, 2), |_| rng.gen_range(0..20) as f64);
    let config = MultiPeriodConfig {
        max_inventory: ParamInput::Scalar(15.0),
        start_inventory: ParamInput::Vector(vec![5.0, 15.0]),
        pipeline: PipelineConfig {
            lead_time: LeadTime::PerUnit(vec![0, 2]),
            max_lead_time: None,
        },
        horizon_train: HorizonTrain::Fixed(10),
        seed: Some(2),
        ..MultiPeriodConfig::default()
    };
    let mut env = MultiPeriodEnv::from_config(loader(demand, None, None), &config).unwrap();

    for _ in 0..80 {
        let order = Array1::from_shape_fn(2, |_| rng.gen_range(0..30) as f64);
        let step = env.step(order.into_dyn()).unwrap();
        assert!(step.reward <= 0.0);
        assert!(env
            .inventory()
            .iter()
            .all(|&level| (0.0..=15.0).contains(&level)));
    }
}

#[test]
fn processors_shape_the_order_before_costing() {
    let config = NewsvendorConfig {
        underage_cost: ParamInput::Scalar(1.0),
        overage_cost: ParamInput::Scalar(1.0),
        ..NewsvendorConfig::default()
    };
    let mut env =
        NewsvendorEnv::from_config(loader(Array2::from_elem((4, 1), 10.0), None, None), &config)
            .unwrap()
            .with_postprocessor(ClipAction::scalar(Some(0.0), Some(12.0)))
            .with_postprocessor(RoundAction::scalar(5.0).unwrap());

    // clipped to 12, rounded to 10
    let step = env.step(array![40.0].into_dyn()).unwrap();
    assert_eq!(step.reward, 0.0);
    assert_eq!(step.info.action, Some(array![10.0]));

    // clipped to 0
    let step = env.step(array![-3.0].into_dyn()).unwrap();
    assert_eq!(step.reward, -10.0);
}

#[test]
fn pipeline_conserves_quantity() {
    let mut rng = StdRng::seed_from_u64(4);
    let config = PipelineConfig {
        lead_time: LeadTime::PerUnit(vec![1, 3]),
        max_lead_time: None,
    };
    let mut pipeline = OrderPipeline::new(2, &config, &mut rng).unwrap();

    let mut ordered = Array1::<f64>::zeros(2);
    let mut arrived = Array1::<f64>::zeros(2);
    for _ in 0..25 {
        let order = Array1::from_shape_fn(2, |_| rng.gen_range(0..10) as f64);
        ordered += &order;
        arrived += &pipeline.step(order.view()).unwrap();
    }
    for _ in 0..3 {
        arrived += &pipeline.step(Array1::zeros(2).view()).unwrap();
    }
    assert_eq!(ordered, arrived);
    assert_eq!(pipeline.in_transit(), array![0.0, 0.0]);
}

#[test]
fn parameter_broadcast_is_idempotent() {
    let mut store = ParamStore::new();
    store.set_param("cost", 5.0, &[3], true).unwrap();
    let first = store.vector("cost").unwrap();
    assert_eq!(first, array![5.0, 5.0, 5.0]);

    store.set_param("cost", first.clone(), &[3], false).unwrap();
    assert_eq!(store.vector("cost").unwrap(), first);
}
