//! Alternative hypotheses and tail probabilities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};
use crate::special;

/// Direction of the alternative hypothesis.
///
/// `Greater` means the treatment (second) group exceeds the control
/// (first) group; `Less` is the reverse.
///
/// # Examples
/// ```
/// use u_experiment::alternative::Alternative;
/// let alt: Alternative = "two-sided".parse().unwrap();
/// assert_eq!(alt, Alternative::TwoSided);
/// assert!("sideways".parse::<Alternative>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    #[default]
    TwoSided,
    Greater,
    Less,
}

impl Alternative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alternative::TwoSided => "two-sided",
            Alternative::Greater => "greater",
            Alternative::Less => "less",
        }
    }

    /// Standard-normal critical value for a test at level `alpha`.
    ///
    /// Two-sided uses the 1 − α/2 quantile, either one-sided direction the
    /// 1 − α quantile.
    pub fn normal_critical_value(&self, alpha: f64) -> Result<f64> {
        match self {
            Alternative::TwoSided => special::normal_ppf(1.0 - alpha / 2.0),
            Alternative::Greater | Alternative::Less => special::normal_ppf(1.0 - alpha),
        }
    }

    /// p-value of an observed standard-normal statistic.
    pub(crate) fn normal_p_value(&self, z: f64) -> f64 {
        let p = match self {
            Alternative::TwoSided => 2.0 * special::normal_cdf(-z.abs()),
            Alternative::Greater => special::normal_cdf(-z),
            Alternative::Less => special::normal_cdf(z),
        };
        p.clamp(0.0, 1.0)
    }

    /// Whether `z` lies beyond `critical` in the direction of this alternative.
    pub(crate) fn rejects(&self, z: f64, critical: f64) -> bool {
        match self {
            Alternative::TwoSided => z.abs() >= critical,
            Alternative::Greater => z >= critical,
            Alternative::Less => z <= -critical,
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alternative {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "two-sided" => Ok(Alternative::TwoSided),
            "greater" => Ok(Alternative::Greater),
            "less" => Ok(Alternative::Less),
            other => Err(ExperimentError::invalid(
                "alternative",
                format!("expected one of two-sided, greater, less; got {other:?}"),
            )),
        }
    }
}
