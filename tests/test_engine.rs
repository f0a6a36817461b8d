//! Integration test: averaging engine end-to-end

use pdp::prelude::*;
use pdp::engine::PredictionResult;
use std::sync::Arc;

/// 100 rows with `x` spread evenly over [0, 10] and a nuisance column `w`
fn uniform_training() -> Dataset {
    let x: Vec<f64> = (0..100).map(|i| i as f64 * 10.0 / 99.0).collect();
    let w: Vec<f64> = (0..100).map(|i| ((i * 37) % 100) as f64 / 10.0).collect();
    Dataset::new(vec![Column::numeric("x", x), Column::numeric("w", w)]).unwrap()
}

fn twice_x() -> FnModel {
    FnModel::scalar(|rows: &Dataset| Ok(rows.numeric("x")?.iter().map(|v| 2.0 * v).collect()))
}

#[test]
fn test_linear_in_x_gives_exact_pdp() {
    let model = twice_x();
    let table = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(5)
        .compute(&["x"], &uniform_training())
        .unwrap();

    assert_eq!(table.len(), 5);
    let xs: Vec<f64> = table
        .records()
        .iter()
        .map(|r| r.features[0].as_f64().unwrap())
        .collect();
    let expected_grid = [0.0, 2.5, 5.0, 7.5, 10.0];
    for (x, e) in xs.iter().zip(expected_grid) {
        assert!((x - e).abs() < 1e-9, "grid point {} != {}", x, e);
    }
    for r in table.records() {
        let x = r.features[0].as_f64().unwrap();
        assert!((r.values[0] - 2.0 * x).abs() < 1e-9);
    }
}

#[test]
fn test_two_feature_grid_order() {
    let model = LinearModel::new(0.0)
        .with_coefficient("x", 1.0)
        .with_coefficient("w", 1.0);
    let table = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(5)
        .compute(&["x", "w"], &uniform_training())
        .unwrap();

    assert_eq!(table.len(), 25);
    let records = table.records();
    for block in 0..5 {
        let first = &records[block * 5].features[0];
        for j in 0..5 {
            assert_eq!(&records[block * 5 + j].features[0], first);
        }
    }
    let w_block: Vec<&Value> = records[..5].iter().map(|r| &r.features[1]).collect();
    let w_next: Vec<&Value> = records[5..10].iter().map(|r| &r.features[1]).collect();
    assert_eq!(w_block, w_next);
}

#[test]
fn test_ignored_feature_gives_flat_curve() {
    let model = twice_x();
    let table = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(7)
        .compute(&["w"], &uniform_training())
        .unwrap();
    let values = table.column("yhat").unwrap();
    assert!(values.iter().all(|v| (v - values[0]).abs() < 1e-12));
}

#[test]
fn test_ice_table_size_and_average() {
    let model = LinearModel::new(1.0)
        .with_coefficient("x", 0.5)
        .with_coefficient("w", -2.0);
    let data = uniform_training();
    let pd = PartialDependence::new(&model).unwrap().with_resolution(4);

    let ice = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(4)
        .with_ice(true)
        .compute(&["x"], &data)
        .unwrap();
    assert_eq!(ice.len(), 4 * 100);
    assert_eq!(ice.ids().len(), 100);
    assert_eq!(ice.value_columns(), &["yhat"]);

    let averaged = ice.average_ice().unwrap();
    let direct = pd.compute(&["x"], &data).unwrap();
    for (a, b) in averaged
        .column("yhat")
        .unwrap()
        .iter()
        .zip(direct.column("yhat").unwrap())
    {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_raw_ice_result_layout() {
    let model = LinearModel::new(0.0).with_coefficient("x", 1.0);
    let data = uniform_training();
    let pd = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(3)
        .with_ice(true);
    let grid = pd.grid(&["x"], &data).unwrap();
    match pd.evaluate_grid(&grid, &data).unwrap() {
        PredictionResult::Ice { row_ids, values, .. } => {
            assert_eq!(row_ids.len(), 100);
            assert_eq!(values.len(), 3);
            assert!(values[2][0].iter().all(|v| (v - 10.0).abs() < 1e-9));
        }
        PredictionResult::Aggregate { .. } => panic!("expected ICE output"),
    }
}

#[test]
fn test_centering_is_idempotent() {
    let model = LinearModel::new(3.0).with_coefficient("x", 1.0);
    let table = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(5)
        .with_ice(true)
        .with_center(true)
        .compute(&["x"], &uniform_training())
        .unwrap();
    assert!(table.is_centered());
    assert_eq!(center(&table), table);
    for id in table.ids() {
        assert_eq!(table.curve(id)[0].values[0], 0.0);
    }
}

#[test]
fn test_seeded_subsample_is_reproducible() {
    let model = LinearModel::new(0.0).with_coefficient("w", 1.0);
    let run = |seed: u64| {
        PartialDependence::new(&model)
            .unwrap()
            .with_resolution(3)
            .with_ice(true)
            .with_subsample(10)
            .with_seed(seed)
            .compute(&["x"], &uniform_training())
            .unwrap()
    };
    let a = run(7);
    assert_eq!(a, run(7));
    assert_eq!(a.ids().len(), 10);
    assert!(a.ids().iter().all(|&id| (1..=100).contains(&id)));
    assert_ne!(a.ids(), run(8).ids());
}

#[test]
fn test_thread_pool_executor_matches_sequential() {
    let model = LinearModel::new(0.0)
        .with_coefficient("x", 1.0)
        .with_coefficient("w", 0.3);
    let data = uniform_training();
    let seq = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(9)
        .compute(&["x", "w"], &data)
        .unwrap();
    let par = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(9)
        .with_executor(Arc::new(ThreadPoolExecutor::new().with_threads(4)))
        .compute(&["x", "w"], &data)
        .unwrap();
    assert_eq!(seq, par);
}

#[test]
fn test_cost_estimate_before_predicting() {
    let model = FnModel::scalar(|_rows: &Dataset| {
        Err(PdpError::PredictionError("must not be called".to_string()))
    });
    let pd = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(5)
        .with_ice(true);
    let cost = pd.estimate_cost(&["x", "w"], &uniform_training()).unwrap();
    assert_eq!(cost.grid_rows, 25);
    assert_eq!(cost.training_rows, 100);
    assert_eq!(cost.predictions, 2500);
    assert_eq!(cost.output_rows, 2500);
}

#[test]
fn test_unknown_feature_rejected() {
    let model = twice_x();
    let err = PartialDependence::new(&model)
        .unwrap()
        .compute(&["missing"], &uniform_training())
        .unwrap_err();
    assert!(matches!(err, PdpError::InvalidFeature { .. }));
}

#[test]
fn test_too_many_features_rejected() {
    let model = twice_x();
    let data = Dataset::new(vec![
        Column::numeric("a", vec![1.0, 2.0]),
        Column::numeric("b", vec![1.0, 2.0]),
        Column::numeric("c", vec![1.0, 2.0]),
        Column::numeric("d", vec![1.0, 2.0]),
    ])
    .unwrap();
    let err = PartialDependence::new(&model)
        .unwrap()
        .compute(&["a", "b", "c", "d"], &data)
        .unwrap_err();
    assert!(matches!(err, PdpError::InvalidFeature { .. }));
}

#[test]
fn test_multi_class_channels() {
    let model = SoftmaxModel::new(
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        vec![
            LinearModel::new(0.0).with_coefficient("x", 1.0),
            LinearModel::new(0.0),
            LinearModel::new(0.0).with_coefficient("x", -1.0),
        ],
    )
    .unwrap();
    let config = PdpConfig::default()
        .with_grid(GridConfig::default().with_resolution(3))
        .with_features(["x"]);
    let pd = PartialDependence::from_config(&model, &config).unwrap();
    let table = pd.compute(&config.features, &uniform_training()).unwrap();
    assert_eq!(table.value_columns(), &["a", "b", "c"]);

    let focused = PartialDependence::from_config(&model, &config.clone().with_class("b")).unwrap();
    let table = focused.compute(&["x"], &uniform_training()).unwrap();
    assert_eq!(table.value_columns().len(), 1);
}

fn spread(v: &[f64]) -> Vec<(String, f64)> {
    let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    vec![("lo".to_string(), lo), ("hi".to_string(), hi)]
}

#[test]
fn test_custom_summary_over_channels() {
    let model = FnModel::new(|rows: &Dataset| {
        let x = rows.numeric("x")?;
        Prediction::multi(vec![
            ("a".to_string(), x.to_vec()),
            ("b".to_string(), x.iter().map(|v| -v).collect()),
        ])
    });
    let table = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(3)
        .with_summary(Summary::custom(spread))
        .compute(&["x"], &uniform_training())
        .unwrap();

    assert_eq!(table.value_columns(), &["a.lo", "a.hi", "b.lo", "b.hi"]);
    let close = |got: Vec<f64>, want: [f64; 3]| {
        got.iter().zip(want).all(|(g, w)| (g - w).abs() < 1e-9)
    };
    // Every row shares the grid value, so min and max coincide
    assert!(close(table.column("a.lo").unwrap(), [0.0, 5.0, 10.0]));
    assert!(close(table.column("a.hi").unwrap(), [0.0, 5.0, 10.0]));
    assert!(close(table.column("b.hi").unwrap(), [0.0, -5.0, -10.0]));
}

#[test]
fn test_custom_summary_names_must_not_change() {
    let model = twice_x();
    let labelled = Summary::custom(|v: &[f64]| {
        let m = v.iter().sum::<f64>() / v.len() as f64;
        let tag = if m < 5.0 { "low" } else { "high" };
        vec![("mean".to_string(), m), (tag.to_string(), m)]
    });
    let err = PartialDependence::new(&model)
        .unwrap()
        .with_resolution(3)
        .with_summary(labelled)
        .compute(&["x"], &uniform_training())
        .unwrap_err();

    match err {
        PdpError::InconsistentOutput { grid_row, grid_point, expected, actual } => {
            assert_eq!(grid_row, 1);
            assert!(grid_point.starts_with("x="));
            assert_eq!(expected, vec!["mean", "low"]);
            assert_eq!(actual, vec!["mean", "high"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_config_resolution_is_grid_error() {
    let model = twice_x();
    let config = PdpConfig::new()
        .with_features(["x"])
        .with_grid(GridConfig::default().with_resolution(1));
    assert!(matches!(
        PartialDependence::from_config(&model, &config),
        Err(PdpError::InvalidGrid { .. })
    ));
}
