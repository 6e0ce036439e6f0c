//! Facade-level smoke tests exercising the prelude.

use rloc::prelude::*;

fn hybrid_readings(target: Pt2, tx_power: Real, path_loss: Real) -> Vec<HybridReading<2>> {
    let source = RadioSource::new("emitter", 2.4e9).unwrap();
    let k = rloc::core::propagation::free_space_constant(2.4e9);
    [
        Pt2::new(0.0, 0.0),
        Pt2::new(10.0, 0.0),
        Pt2::new(10.0, 10.0),
        Pt2::new(0.0, 10.0),
        Pt2::new(5.0, 0.0),
        Pt2::new(0.0, 5.0),
    ]
    .iter()
    .map(|p| {
        let d = distance(p, &target);
        let rssi = rloc::core::propagation::expected_rssi_dbm(k, d, tx_power, path_loss);
        HybridReading::new(source.clone(), *p, d, rssi).unwrap()
    })
    .collect()
}

#[test]
fn sequential_estimator_through_the_facade() {
    let target = Pt2::new(2.5, 7.5);
    let mut config = SequentialConfig::default();
    config.position.method = RobustMethod::Ransac;
    config.position.threshold = 0.5;
    config.radiated.method = RobustMethod::Lmeds;

    let mut estimator =
        SequentialHybridEstimator::with_config(hybrid_readings(target, -9.0, 2.0), config)
            .unwrap();
    estimator.estimate().unwrap();

    let position = estimator.estimated_position().unwrap();
    assert!(distance(position, &target) < 1e-3);
    assert!((estimator.estimated_tx_power_dbm().unwrap() - -9.0).abs() < 1e-3);
}

#[test]
fn hybrid_estimator_rejects_corrupted_rssi() {
    let target = Pt2::new(5.0, 5.0);
    let mut readings = hybrid_readings(target, -12.0, 2.0);
    // One receiver reports a wildly wrong signal strength.
    let bad = &readings[1];
    readings[1] = HybridReading::new(
        bad.source.clone(),
        bad.position,
        bad.distance,
        bad.rssi_dbm - 40.0,
    )
    .unwrap();

    let mut config = HybridConfig::default();
    config.robust.method = RobustMethod::Msac;
    config.robust.threshold = 2.0;

    let mut estimator = RobustHybridEstimator::with_config(readings, config).unwrap();
    estimator.estimate().unwrap();

    assert!(distance(estimator.estimated_position().unwrap(), &target) < 1e-3);
    assert!((estimator.estimated_tx_power_dbm().unwrap() - -12.0).abs() < 0.5);
    let inliers = estimator.inliers_data().unwrap();
    assert!(!inliers.mask[1], "corrupted reading not excluded");
    assert_eq!(inliers.num_inliers, 5);
}
