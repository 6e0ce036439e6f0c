//! Located-reading value types.
//!
//! A reading is one observation of the emitter taken at a known
//! receiver position: a direct distance measurement ([`RangeReading`],
//! e.g. from time-of-flight), a received signal strength
//! ([`RssiReading`]) or both at once ([`HybridReading`]). Readings are
//! validated on construction and immutable afterwards; estimators hold
//! read-only slices of them.

use crate::math::{MatN, PtN, Real};
use crate::source::RadioSource;
use anyhow::{ensure, Result};

fn check_std_dev(std_dev: Option<Real>) -> Result<()> {
    if let Some(s) = std_dev {
        ensure!(
            s.is_finite() && s > 0.0,
            "measurement standard deviation must be positive, got {}",
            s
        );
    }
    Ok(())
}

/// Direct distance measurement from a known receiver position.
#[derive(Debug, Clone)]
pub struct RangeReading<const D: usize> {
    pub source: RadioSource,
    /// Receiver position at which the measurement was taken.
    pub position: PtN<D>,
    /// Measured distance to the emitter (meters).
    pub distance: Real,
    /// Standard deviation of the distance measurement, if known.
    pub distance_std_dev: Option<Real>,
    /// Covariance of the receiver position, if known.
    pub position_covariance: Option<MatN<D>>,
}

impl<const D: usize> RangeReading<D> {
    pub fn new(source: RadioSource, position: PtN<D>, distance: Real) -> Result<Self> {
        ensure!(
            distance.is_finite() && distance >= 0.0,
            "distance must be non-negative, got {}",
            distance
        );
        Ok(Self {
            source,
            position,
            distance,
            distance_std_dev: None,
            position_covariance: None,
        })
    }

    pub fn with_uncertainty(
        source: RadioSource,
        position: PtN<D>,
        distance: Real,
        distance_std_dev: Real,
    ) -> Result<Self> {
        let mut reading = Self::new(source, position, distance)?;
        check_std_dev(Some(distance_std_dev))?;
        reading.distance_std_dev = Some(distance_std_dev);
        Ok(reading)
    }

    pub fn with_position_covariance(mut self, covariance: MatN<D>) -> Self {
        self.position_covariance = Some(covariance);
        self
    }
}

/// Received-signal-strength measurement from a known receiver position.
#[derive(Debug, Clone)]
pub struct RssiReading<const D: usize> {
    pub source: RadioSource,
    /// Receiver position at which the measurement was taken.
    pub position: PtN<D>,
    /// Received power in dBm.
    pub rssi_dbm: Real,
    /// Standard deviation of the RSSI measurement, if known.
    pub rssi_std_dev: Option<Real>,
    /// Covariance of the receiver position, if known.
    pub position_covariance: Option<MatN<D>>,
}

impl<const D: usize> RssiReading<D> {
    pub fn new(source: RadioSource, position: PtN<D>, rssi_dbm: Real) -> Result<Self> {
        ensure!(rssi_dbm.is_finite(), "RSSI must be finite, got {}", rssi_dbm);
        Ok(Self {
            source,
            position,
            rssi_dbm,
            rssi_std_dev: None,
            position_covariance: None,
        })
    }

    pub fn with_uncertainty(
        source: RadioSource,
        position: PtN<D>,
        rssi_dbm: Real,
        rssi_std_dev: Real,
    ) -> Result<Self> {
        let mut reading = Self::new(source, position, rssi_dbm)?;
        check_std_dev(Some(rssi_std_dev))?;
        reading.rssi_std_dev = Some(rssi_std_dev);
        Ok(reading)
    }

    pub fn with_position_covariance(mut self, covariance: MatN<D>) -> Self {
        self.position_covariance = Some(covariance);
        self
    }
}

/// Reading carrying both a distance and an RSSI measurement.
///
/// Used by the hybrid and sequential estimators, which exploit the
/// better-conditioned range component for position and the RSSI
/// component for transmitted power and path loss.
#[derive(Debug, Clone)]
pub struct HybridReading<const D: usize> {
    pub source: RadioSource,
    pub position: PtN<D>,
    pub distance: Real,
    pub rssi_dbm: Real,
    pub distance_std_dev: Option<Real>,
    pub rssi_std_dev: Option<Real>,
    pub position_covariance: Option<MatN<D>>,
}

impl<const D: usize> HybridReading<D> {
    pub fn new(
        source: RadioSource,
        position: PtN<D>,
        distance: Real,
        rssi_dbm: Real,
    ) -> Result<Self> {
        ensure!(
            distance.is_finite() && distance >= 0.0,
            "distance must be non-negative, got {}",
            distance
        );
        ensure!(rssi_dbm.is_finite(), "RSSI must be finite, got {}", rssi_dbm);
        Ok(Self {
            source,
            position,
            distance,
            rssi_dbm,
            distance_std_dev: None,
            rssi_std_dev: None,
            position_covariance: None,
        })
    }

    pub fn with_uncertainty(
        source: RadioSource,
        position: PtN<D>,
        distance: Real,
        rssi_dbm: Real,
        distance_std_dev: Real,
        rssi_std_dev: Real,
    ) -> Result<Self> {
        let mut reading = Self::new(source, position, distance, rssi_dbm)?;
        check_std_dev(Some(distance_std_dev))?;
        check_std_dev(Some(rssi_std_dev))?;
        reading.distance_std_dev = Some(distance_std_dev);
        reading.rssi_std_dev = Some(rssi_std_dev);
        Ok(reading)
    }

    pub fn with_position_covariance(mut self, covariance: MatN<D>) -> Self {
        self.position_covariance = Some(covariance);
        self
    }

    /// Split into the range and RSSI components, duplicating the
    /// source identity and receiver position.
    pub fn split(&self) -> (RangeReading<D>, RssiReading<D>) {
        let range = RangeReading {
            source: self.source.clone(),
            position: self.position,
            distance: self.distance,
            distance_std_dev: self.distance_std_dev,
            position_covariance: self.position_covariance,
        };
        let rssi = RssiReading {
            source: self.source.clone(),
            position: self.position,
            rssi_dbm: self.rssi_dbm,
            rssi_std_dev: self.rssi_std_dev,
            position_covariance: self.position_covariance,
        };
        (range, rssi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Pt2;

    fn src() -> RadioSource {
        RadioSource::with_default_frequency("ap-1")
    }

    #[test]
    fn range_reading_rejects_negative_distance() {
        assert!(RangeReading::new(src(), Pt2::new(0.0, 0.0), -1.0).is_err());
        assert!(RangeReading::new(src(), Pt2::new(0.0, 0.0), Real::NAN).is_err());
    }

    #[test]
    fn range_reading_rejects_bad_std_dev() {
        assert!(RangeReading::with_uncertainty(src(), Pt2::new(0.0, 0.0), 1.0, 0.0).is_err());
        assert!(RangeReading::with_uncertainty(src(), Pt2::new(0.0, 0.0), 1.0, -0.5).is_err());
        assert!(RangeReading::with_uncertainty(src(), Pt2::new(0.0, 0.0), 1.0, 0.3).is_ok());
    }

    #[test]
    fn rssi_reading_accepts_negative_dbm() {
        let r = RssiReading::new(src(), Pt2::new(1.0, 1.0), -72.5).unwrap();
        assert_eq!(r.rssi_dbm, -72.5);
        assert!(r.rssi_std_dev.is_none());
    }

    #[test]
    fn hybrid_reading_splits_into_components() {
        let h = HybridReading::with_uncertainty(src(), Pt2::new(2.0, 3.0), 4.0, -60.0, 0.1, 1.0)
            .unwrap();
        let (range, rssi) = h.split();
        assert_eq!(range.distance, 4.0);
        assert_eq!(range.distance_std_dev, Some(0.1));
        assert_eq!(rssi.rssi_dbm, -60.0);
        assert_eq!(rssi.rssi_std_dev, Some(1.0));
        assert_eq!(range.position, rssi.position);
        assert_eq!(range.source, rssi.source);
    }
}
