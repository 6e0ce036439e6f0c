//! End-to-end estimation scenarios over synthetic reading sets.

use rloc_core::math::{distance, Pt2, Real};
use rloc_core::propagation::{expected_rssi_dbm, free_space_constant};
use rloc_core::reading::RangeReading;
use rloc_core::robust::RobustMethod;
use rloc_core::source::RadioSource;
use rloc_pipeline::{RobustConfig, RobustRangingEstimator, RssiConfig, RobustRssiEstimator};
use std::cell::RefCell;
use std::rc::Rc;

fn source() -> RadioSource {
    RadioSource::new("emitter", 2.4e9).unwrap()
}

/// Four receivers at the corners of a 10x10 square, distances to the
/// emitter at (5, 5).
fn square_readings() -> Vec<RangeReading<2>> {
    let target = Pt2::new(5.0, 5.0);
    [
        Pt2::new(0.0, 0.0),
        Pt2::new(10.0, 0.0),
        Pt2::new(10.0, 10.0),
        Pt2::new(0.0, 10.0),
    ]
    .iter()
    .map(|p| RangeReading::new(source(), *p, distance(p, &target)).unwrap())
    .collect()
}

fn config_for(method: RobustMethod) -> RobustConfig {
    RobustConfig {
        method,
        threshold: 0.5,
        ..RobustConfig::default()
    }
}

#[test]
fn every_method_recovers_square_center_with_zero_noise() {
    for method in [
        RobustMethod::Ransac,
        RobustMethod::Msac,
        RobustMethod::Prosac,
        RobustMethod::Lmeds,
        RobustMethod::Promeds,
    ] {
        let mut est =
            RobustRangingEstimator::with_config(square_readings(), config_for(method)).unwrap();
        if method.requires_quality_scores() {
            est.set_quality_scores(Some(vec![1.0; 4])).unwrap();
        }
        est.estimate()
            .unwrap_or_else(|e| panic!("{method:?} failed: {e}"));

        let p = est.estimated_position().unwrap();
        assert!(
            (p.x - 5.0).abs() < 1e-4 && (p.y - 5.0).abs() < 1e-4,
            "{method:?} returned {p:?}"
        );
        // Zero noise: no reading may be excluded.
        let inliers = est.inliers_data().unwrap();
        assert_eq!(inliers.num_inliers, 4, "{method:?} excluded readings");
    }
}

#[test]
fn ransac_flags_exactly_the_corrupted_reading() {
    let mut readings = square_readings();
    readings[2] = RangeReading::new(
        source(),
        readings[2].position,
        readings[2].distance + 50.0,
    )
    .unwrap();

    let mut est =
        RobustRangingEstimator::with_config(readings, config_for(RobustMethod::Ransac)).unwrap();
    est.estimate().unwrap();

    let p = est.estimated_position().unwrap();
    assert!((p.x - 5.0).abs() < 1e-3 && (p.y - 5.0).abs() < 1e-3, "got {p:?}");

    let inliers = est.inliers_data().unwrap();
    assert_eq!(inliers.num_inliers, 3);
    assert_eq!(inliers.mask, vec![true, true, false, true]);
}

#[test]
fn estimate_is_idempotent() {
    let mut est =
        RobustRangingEstimator::with_config(square_readings(), config_for(RobustMethod::Ransac))
            .unwrap();
    est.estimate().unwrap();
    let first = *est.estimated_position().unwrap();
    let first_inliers = est.inliers_data().unwrap().num_inliers;

    est.estimate().unwrap();
    let second = *est.estimated_position().unwrap();
    assert!(distance(&first, &second) < 1e-12);
    assert_eq!(est.inliers_data().unwrap().num_inliers, first_inliers);
}

#[test]
fn refinement_disabled_reports_no_covariance() {
    let mut config = config_for(RobustMethod::Ransac);
    config.refine = false;
    let mut est = RobustRangingEstimator::with_config(square_readings(), config).unwrap();
    est.estimate().unwrap();
    assert!(est.estimated_position().is_some());
    assert!(est.estimated_position_covariance().is_none());
}

#[test]
fn refinement_with_covariance_produces_symmetric_block() {
    let mut est =
        RobustRangingEstimator::with_config(square_readings(), config_for(RobustMethod::Ransac))
            .unwrap();
    est.estimate().unwrap();
    let cov = est
        .estimated_position_covariance()
        .expect("covariance requested by default");
    assert!((cov[(0, 1)] - cov[(1, 0)]).abs() < 1e-12);
    assert!(cov[(0, 0)] >= 0.0 && cov[(1, 1)] >= 0.0);
}

#[derive(Default)]
struct RecordingState {
    started: usize,
    ended: usize,
    iterations: usize,
    progress: Vec<Real>,
}

struct RecordingListener(Rc<RefCell<RecordingState>>);

impl rloc_pipeline::EstimateListener for RecordingListener {
    fn on_estimate_start(&mut self) {
        self.0.borrow_mut().started += 1;
    }
    fn on_estimate_end(&mut self) {
        self.0.borrow_mut().ended += 1;
    }
    fn on_iteration(&mut self, _iteration: usize) {
        self.0.borrow_mut().iterations += 1;
    }
    fn on_progress(&mut self, progress: Real) {
        self.0.borrow_mut().progress.push(progress);
    }
}

#[test]
fn listener_receives_lifecycle_and_iteration_events() {
    let state = Rc::new(RefCell::new(RecordingState::default()));
    let mut est =
        RobustRangingEstimator::with_config(square_readings(), config_for(RobustMethod::Ransac))
            .unwrap();
    est.set_listener(Some(Box::new(RecordingListener(state.clone()))))
        .unwrap();
    est.estimate().unwrap();

    let state = state.borrow();
    assert_eq!(state.started, 1);
    assert_eq!(state.ended, 1);
    assert!(state.iterations > 0);
    assert!(state.progress.iter().all(|p| (0.0..=1.0).contains(p)));
}

/// Combined position + power + path-loss estimation: the covariance
/// partitions into a position block, a power variance and a path-loss
/// variance with no overlap and no gap.
#[test]
fn combined_covariance_partitions_cleanly() {
    let target = Pt2::new(4.0, 6.0);
    let (tx_power, path_loss) = (-12.0, 2.0);
    let k = free_space_constant(2.4e9);
    let anchors = [
        Pt2::new(0.0, 0.0),
        Pt2::new(10.0, 0.0),
        Pt2::new(10.0, 10.0),
        Pt2::new(0.0, 10.0),
        Pt2::new(5.0, 0.0),
        Pt2::new(0.0, 5.0),
        Pt2::new(10.0, 5.0),
        Pt2::new(5.0, 10.0),
    ];
    let readings: Vec<_> = anchors
        .iter()
        .map(|p| {
            rloc_core::reading::RssiReading::new(
                source(),
                *p,
                expected_rssi_dbm(k, distance(p, &target), tx_power, path_loss),
            )
            .unwrap()
        })
        .collect();

    let mut config = RssiConfig::<2>::default();
    config.robust.method = RobustMethod::Ransac;
    config.robust.threshold = 1.0;
    config.estimate_position = true;
    config.estimate_tx_power = true;
    config.estimate_path_loss = true;
    config.initial_tx_power_dbm = Some(tx_power);

    let mut est = RobustRssiEstimator::with_config(readings, config).unwrap();
    est.estimate().unwrap();

    assert!(distance(est.estimated_position().unwrap(), &target) < 1e-3);
    assert!((est.estimated_tx_power_dbm().unwrap() - tx_power).abs() < 1e-3);
    assert!((est.estimated_path_loss_exponent().unwrap() - path_loss).abs() < 1e-3);

    let full = est.estimated_covariance().expect("active covariance");
    assert_eq!(full.nrows(), 4);

    let position_block = est.estimated_position_covariance().unwrap();
    for r in 0..2 {
        for c in 0..2 {
            assert_eq!(position_block[(r, c)], full[(r, c)]);
        }
    }
    assert_eq!(est.estimated_tx_power_variance().unwrap(), full[(2, 2)]);
    assert_eq!(est.estimated_path_loss_variance().unwrap(), full[(3, 3)]);
}
