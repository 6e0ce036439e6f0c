use crate::math::Real;
use crate::propagation;
use anyhow::{ensure, Result};

/// Default carrier frequency (Hz) when a source does not specify one.
pub const DEFAULT_FREQUENCY: Real = 2.4e9;

/// Identity of a radio emitter whose position is being estimated.
///
/// The carrier frequency feeds the free-space constant of the
/// propagation model; it must be positive and finite.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioSource {
    /// Stable identifier (MAC address, beacon UUID, ...).
    pub id: String,
    /// Carrier frequency in Hz.
    pub frequency: Real,
}

impl RadioSource {
    pub fn new(id: impl Into<String>, frequency: Real) -> Result<Self> {
        ensure!(
            frequency.is_finite() && frequency > 0.0,
            "carrier frequency must be positive, got {}",
            frequency
        );
        Ok(Self {
            id: id.into(),
            frequency,
        })
    }

    /// Source with the default 2.4 GHz carrier.
    pub fn with_default_frequency(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frequency: DEFAULT_FREQUENCY,
        }
    }

    /// Free-space constant `k = c / (4π·f)` for this source.
    pub fn free_space_constant(&self) -> Real {
        propagation::free_space_constant(self.frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_frequency() {
        assert!(RadioSource::new("ap", 0.0).is_err());
        assert!(RadioSource::new("ap", -1.0).is_err());
        assert!(RadioSource::new("ap", Real::NAN).is_err());
    }

    #[test]
    fn default_frequency_source() {
        let s = RadioSource::with_default_frequency("ap");
        assert_eq!(s.frequency, DEFAULT_FREQUENCY);
        assert!(s.free_space_constant() > 0.0);
    }
}
