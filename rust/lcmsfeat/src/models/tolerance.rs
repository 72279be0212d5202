use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::ConfigError;
use crate::utils::TupleRange;

/// m/z matching tolerance.
///
/// Convention: tolerances are positive half-widths. A tolerance of 10 ppm on
/// a value of 500 means the window (499.995, 500.005).
///
/// `Either` accepts a match when it falls within the absolute OR the relative
/// window, whichever is wider at that m/z.
///
/// Example:
/// ```
/// use lcmsfeat::models::MzTolerance;
///
/// let tol = MzTolerance::Ppm(20.0);
/// let range = tol.mz_range(500.0);
/// assert!((range.start() - 499.99).abs() < 1e-9);
/// assert!((range.end() - 500.01).abs() < 1e-9);
///
/// let either = MzTolerance::Either { da: 0.005, ppm: 20.0 };
/// assert!((either.delta(100.0) - 0.005).abs() < 1e-12);
/// assert!((either.delta(1000.0) - 0.02).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MzTolerance {
    #[serde(rename = "da")]
    Absolute(f64),
    #[serde(rename = "ppm")]
    Ppm(f64),
    #[serde(rename = "either")]
    Either { da: f64, ppm: f64 },
}

impl Default for MzTolerance {
    fn default() -> Self {
        MzTolerance::Ppm(10.0)
    }
}

impl MzTolerance {
    /// Allowed absolute deviation (in daltons) around `mz`.
    pub fn delta(&self, mz: f64) -> f64 {
        match *self {
            MzTolerance::Absolute(da) => da,
            MzTolerance::Ppm(ppm) => mz.abs() * ppm / 1e6,
            MzTolerance::Either { da, ppm } => da.max(mz.abs() * ppm / 1e6),
        }
    }

    pub fn mz_range(&self, mz: f64) -> TupleRange<f64> {
        let delta = self.delta(mz);
        TupleRange::spanning(mz - delta, mz + delta)
    }

    /// Whether `observed` lies within tolerance of `reference`.
    ///
    /// The tolerance is evaluated at `reference`, so the relation is not
    /// strictly symmetric for ppm tolerances.
    pub fn matches(&self, reference: f64, observed: f64) -> bool {
        (observed - reference).abs() <= self.delta(reference)
    }

    pub(crate) fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let check = |value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    field,
                    value,
                    expected: "a finite, non-negative tolerance",
                })
            }
        };
        match *self {
            MzTolerance::Absolute(da) => check(da),
            MzTolerance::Ppm(ppm) => check(ppm),
            MzTolerance::Either { da, ppm } => {
                check(da)?;
                check(ppm)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_uses_reference_mz() {
        let tol = MzTolerance::Ppm(2.0);
        assert!(tol.matches(200.0, 200.0003));
        assert!(tol.matches(200.0, 199.9997));
        assert!(!tol.matches(200.0, 200.0006));
    }

    #[test]
    fn test_negative_tolerance_is_rejected() {
        assert!(MzTolerance::Absolute(-0.1).validate("x").is_err());
        assert!(
            MzTolerance::Either {
                da: 0.01,
                ppm: f64::NAN
            }
            .validate("x")
            .is_err()
        );
        assert!(MzTolerance::Ppm(0.0).validate("x").is_ok());
    }

    #[test]
    fn test_serde_tags() {
        let tol: MzTolerance = serde_json::from_str(r#"{"ppm": 10.0}"#).unwrap();
        assert_eq!(tol, MzTolerance::Ppm(10.0));
        let tol: MzTolerance = serde_json::from_str(r#"{"either": {"da": 0.01, "ppm": 5.0}}"#).unwrap();
        assert_eq!(tol, MzTolerance::Either { da: 0.01, ppm: 5.0 });
    }
}
