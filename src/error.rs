//! Domain validation errors.
//!
//! Every public operation validates its inputs before doing any numeric
//! work and reports the first offending parameter by name. Numerically
//! degenerate but valid inputs are not errors; they surface as warnings
//! on the result record instead.

use thiserror::Error;

/// Error raised when an input is outside its documented domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExperimentError {
    /// A parameter is out of range, non-finite, mismatched, or otherwise
    /// invalid.
    #[error("invalid `{parameter}`: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

impl ExperimentError {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        ExperimentError::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }

    /// Name of the parameter that failed validation.
    pub fn parameter(&self) -> &'static str {
        match self {
            ExperimentError::InvalidParameter { parameter, .. } => parameter,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ExperimentError>;

pub(crate) fn ensure_finite(parameter: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(ExperimentError::invalid(
            parameter,
            format!("must be finite, got {value}"),
        ));
    }
    Ok(value)
}

pub(crate) fn ensure_positive(parameter: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ExperimentError::invalid(
            parameter,
            format!("must be finite and > 0, got {value}"),
        ));
    }
    Ok(value)
}

pub(crate) fn ensure_non_negative(parameter: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ExperimentError::invalid(
            parameter,
            format!("must be finite and >= 0, got {value}"),
        ));
    }
    Ok(value)
}

/// Accepts values strictly inside (0, 1).
pub(crate) fn ensure_open_unit(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_nan() || value <= 0.0 || value >= 1.0 {
        return Err(ExperimentError::invalid(
            parameter,
            format!("must lie in the open interval (0, 1), got {value}"),
        ));
    }
    Ok(value)
}

/// Accepts values in the closed interval [0, 1].
pub(crate) fn ensure_probability(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(ExperimentError::invalid(
            parameter,
            format!("must lie in [0, 1], got {value}"),
        ));
    }
    Ok(value)
}

pub(crate) fn ensure_optional_alpha(alpha: Option<f64>) -> Result<Option<f64>> {
    alpha.map(|a| ensure_open_unit("alpha", a)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_parameter() {
        let err = ensure_open_unit("alpha", 1.5).unwrap_err();
        assert_eq!(err.parameter(), "alpha");
        let msg = err.to_string();
        assert!(msg.starts_with("invalid `alpha`"), "got {msg}");
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_open_unit_bounds() {
        assert!(ensure_open_unit("p", 0.0).is_err());
        assert!(ensure_open_unit("p", 1.0).is_err());
        assert!(ensure_open_unit("p", f64::NAN).is_err());
        assert_eq!(ensure_open_unit("p", 0.3), Ok(0.3));
    }

    #[test]
    fn test_probability_is_closed() {
        assert_eq!(ensure_probability("rate", 0.0), Ok(0.0));
        assert_eq!(ensure_probability("rate", 1.0), Ok(1.0));
        assert!(ensure_probability("rate", -0.01).is_err());
    }

    #[test]
    fn test_positive_rejects_infinity() {
        assert!(ensure_positive("tau", f64::INFINITY).is_err());
        assert!(ensure_positive("tau", 0.0).is_err());
        assert!(ensure_non_negative("sd", 0.0).is_ok());
        assert!(ensure_finite("mean", f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_optional_alpha() {
        assert_eq!(ensure_optional_alpha(None), Ok(None));
        assert_eq!(ensure_optional_alpha(Some(0.05)), Ok(Some(0.05)));
        assert!(ensure_optional_alpha(Some(0.0)).is_err());
    }
}
