use thiserror::Error;
use xlkit_core::{Operand, XlKitError};

/// Mean and population variance of a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
}

#[derive(Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("Can't calculate stats on empty range")]
    EmptyRange,

    #[error("{0} is not a finite number")]
    NotFinite(f64),
}

impl From<StatsError> for XlKitError {
    fn from(err: StatsError) -> XlKitError {
        match err {
            StatsError::EmptyRange => XlKitError::empty_input(err.to_string()),
            StatsError::NotFinite(x) => XlKitError::parse(x.to_string(), "finite number"),
        }
    }
}

pub fn circumference(diameter: f64) -> f64 {
    diameter * std::f64::consts::PI
}

/// Two passes over the data: the mean first, then the squared deviations from it
pub fn summarize(xs: &[f64]) -> Result<Summary, StatsError> {
    if xs.is_empty() {
        return Err(StatsError::EmptyRange);
    }
    if let Some(x) = xs.iter().find(|x| !x.is_finite()) {
        return Err(StatsError::NotFinite(*x));
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let variance = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    Ok(Summary {
        count: xs.len(),
        mean,
        variance,
    })
}

/// Every cell of a range as a number, row by row. A single value counts as a 1x1 range.
pub fn numbers(range: &Operand) -> xlkit_core::Result<Vec<f64>> {
    if range.is_matrix() {
        range.as_matrix()?.iter().map(|cell| cell.get::<f64>()).collect()
    } else {
        Ok(vec![range.get::<f64>()?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let s = summarize(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.count, 4);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.variance - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_range() {
        assert_eq!(summarize(&[]), Err(StatsError::EmptyRange));
        let err = XlKitError::from(StatsError::EmptyRange);
        assert_eq!(err.error_code(), xlkit_core::ErrorCode::Div0);
    }

    #[test]
    fn test_non_finite_input() {
        assert_eq!(summarize(&[1.0, f64::INFINITY]), Err(StatsError::NotFinite(f64::INFINITY)));
    }

    #[test]
    fn test_numbers_from_range() {
        let mut range = Operand::missing();
        {
            let mut m = range.set_matrix(2, 1, None).unwrap();
            m[(0, 0)].set(1.5).unwrap();
            m[(1, 0)].set("2.5").unwrap();
        }
        assert_eq!(numbers(&range).unwrap(), vec![1.5, 2.5]);
        assert_eq!(numbers(&Operand::number(4.0)).unwrap(), vec![4.0]);
        assert!(numbers(&Operand::nil()).is_err());
    }

    #[test]
    fn test_circumference() {
        assert!((circumference(2.0) - 6.283185307179586).abs() < 1e-12);
    }
}
