//! Plain input records supplied by callers.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_non_negative, ExperimentError, Result};

/// Conversion counts for one experiment arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionSample {
    pub successes: u64,
    pub total: u64,
}

impl ProportionSample {
    pub fn new(successes: u64, total: u64) -> Self {
        Self { successes, total }
    }

    /// Observed rate `successes / total`.
    pub fn rate(&self) -> f64 {
        self.successes as f64 / self.total as f64
    }

    /// `total − successes`, or 0 when the record is inconsistent
    /// (`successes > total`).
    pub fn failures(&self) -> u64 {
        self.total.saturating_sub(self.successes)
    }

    /// Checks `total ≥ 1` and `successes ≤ total`.
    pub(crate) fn validate(&self, parameter: &'static str) -> Result<()> {
        self.validate_counts(parameter)?;
        if self.total == 0 {
            return Err(ExperimentError::invalid(parameter, "total must be at least 1"));
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate) but allows an empty arm.
    pub(crate) fn validate_counts(&self, parameter: &'static str) -> Result<()> {
        if self.successes > self.total {
            return Err(ExperimentError::invalid(
                parameter,
                format!(
                    "successes ({}) cannot exceed total ({})",
                    self.successes, self.total
                ),
            ));
        }
        Ok(())
    }
}

/// Summary statistics of a continuous metric for one experiment arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanSample {
    pub mean: f64,
    pub std_dev: f64,
    pub n: u64,
}

impl MeanSample {
    pub fn new(mean: f64, std_dev: f64, n: u64) -> Self {
        Self { mean, std_dev, n }
    }

    /// Squared standard error `s² / n`.
    pub(crate) fn variance_of_mean(&self) -> f64 {
        self.std_dev * self.std_dev / self.n as f64
    }

    pub(crate) fn validate(&self, parameter: &'static str) -> Result<()> {
        ensure_finite(parameter, self.mean)?;
        ensure_non_negative(parameter, self.std_dev)?;
        if self.n < 2 {
            return Err(ExperimentError::invalid(
                parameter,
                format!("n must be at least 2, got {}", self.n),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportion_rate() {
        let s = ProportionSample::new(50, 1000);
        assert!((s.rate() - 0.05).abs() < 1e-15);
        assert_eq!(s.failures(), 950);
    }

    #[test]
    fn test_failures_of_inconsistent_record() {
        let s = ProportionSample::new(5, 3);
        assert_eq!(s.failures(), 0);
        assert!(s.validate_counts("control").is_err());
        assert_eq!(ProportionSample::new(u64::MAX, 0).failures(), 0);
    }

    #[test]
    fn test_proportion_validation() {
        assert!(ProportionSample::new(3, 2).validate("control").is_err());
        assert!(ProportionSample::new(0, 0).validate("control").is_err());
        assert!(ProportionSample::new(0, 0).validate_counts("control").is_ok());
        assert!(ProportionSample::new(2, 2).validate("control").is_ok());
    }

    #[test]
    fn test_mean_validation() {
        assert!(MeanSample::new(1.0, -0.1, 10).validate("treatment").is_err());
        assert!(MeanSample::new(1.0, 0.5, 1).validate("treatment").is_err());
        assert!(MeanSample::new(f64::NAN, 0.5, 10).validate("treatment").is_err());
        let err = MeanSample::new(1.0, 0.5, 1).validate("treatment").unwrap_err();
        assert_eq!(err.parameter(), "treatment");
    }
}
