//! Small descriptive-statistics helpers over `f64` slices.
//!
//! Callers pass already-trimmed, finite data. Empty input yields `0.0`
//! rather than NaN.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (divide by N-1); 0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// std / |mean|, or `None` when the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values);
    if m == 0.0 {
        None
    } else {
        Some(std_dev(values) / m.abs())
    }
}

/// Pearson correlation; 0 when either series is constant.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let (mx, my) = (mean(x), mean(y));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return 0.0;
    }
    (cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0)
}

/// Rolling maximum over `period` values ending at each index; NaN before the
/// window fills or when the window holds a NaN.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// Rolling minimum, see [`rolling_max`].
pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = f(window);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn mean_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx(mean(&v), 5.0, DEFAULT_EPSILON);
        // Sample variance = 32 / 7
        assert_approx(std_dev(&v), (32.0f64 / 7.0).sqrt(), DEFAULT_EPSILON);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn cv_of_zero_mean_is_none() {
        assert!(coefficient_of_variation(&[-1.0, 1.0]).is_none());
        assert_approx(
            coefficient_of_variation(&[5.0, 5.0, 5.0]).unwrap(),
            0.0,
            DEFAULT_EPSILON,
        );
    }

    #[test]
    fn correlation_perfect_and_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_approx(correlation(&x, &[2.0, 4.0, 6.0, 8.0]), 1.0, 1e-12);
        assert_approx(correlation(&x, &[8.0, 6.0, 4.0, 2.0]), -1.0, 1e-12);
        assert_eq!(correlation(&x, &[3.0, 3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn rolling_extremes() {
        let v = [1.0, 3.0, 2.0, 5.0, 4.0];
        let hi = rolling_max(&v, 3);
        let lo = rolling_min(&v, 3);
        assert!(hi[0].is_nan() && hi[1].is_nan());
        assert_eq!(&hi[2..], &[3.0, 5.0, 5.0]);
        assert_eq!(&lo[2..], &[1.0, 2.0, 2.0]);
    }
}
