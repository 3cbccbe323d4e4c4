//! Running moments of a single chain and the stopping rule built on them.

use ndarray::prelude::*;

/// Running sums over the retained samples of a chain.
///
/// Every sweep adds the current parameter vector once, whether or not any block
/// was accepted. `lag1_cross_sum` pairs each sample with the one before it; the
/// first sample is paired with the starting point.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTracker {
    iteration: u64,
    previous: Array1<f64>,
    param_sum: Array1<f64>,
    param_squared_sum: Array1<f64>,
    lag1_cross_sum: Array1<f64>,
}

impl ChainTracker {
    pub fn new(start: &[f64]) -> Self {
        let n = start.len();
        Self {
            iteration: 0,
            previous: Array1::from(start.to_vec()),
            param_sum: Array1::zeros(n),
            param_squared_sum: Array1::zeros(n),
            lag1_cross_sum: Array1::zeros(n),
        }
    }

    /// Rebuilds a tracker from saved sums, bit for bit.
    pub fn from_parts(
        iteration: u64,
        previous: Vec<f64>,
        param_sum: Vec<f64>,
        param_squared_sum: Vec<f64>,
        lag1_cross_sum: Vec<f64>,
    ) -> Self {
        let n = previous.len();
        assert!(
            param_sum.len() == n && param_squared_sum.len() == n && lag1_cross_sum.len() == n,
            "all running sums must have {n} entries"
        );
        Self {
            iteration,
            previous: Array1::from(previous),
            param_sum: Array1::from(param_sum),
            param_squared_sum: Array1::from(param_squared_sum),
            lag1_cross_sum: Array1::from(lag1_cross_sum),
        }
    }

    pub fn step(&mut self, current: &[f64]) {
        let x = ArrayView1::from(current);
        assert_eq!(x.len(), self.previous.len(), "wrong number of parameters");
        self.param_sum += &x;
        self.param_squared_sum += &x.mapv(|v| v * v);
        self.lag1_cross_sum += &(&x * &self.previous);
        self.previous.assign(&x);
        self.iteration += 1;
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn previous(&self) -> &[f64] {
        self.previous.as_slice().unwrap_or(&[])
    }

    pub fn param_sum(&self) -> &[f64] {
        self.param_sum.as_slice().unwrap_or(&[])
    }

    pub fn param_squared_sum(&self) -> &[f64] {
        self.param_squared_sum.as_slice().unwrap_or(&[])
    }

    pub fn lag1_cross_sum(&self) -> &[f64] {
        self.lag1_cross_sum.as_slice().unwrap_or(&[])
    }

    pub fn mean(&self) -> Array1<f64> {
        if self.iteration == 0 {
            return Array1::zeros(self.param_sum.len());
        }
        &self.param_sum / self.iteration as f64
    }

    /// Standard error of the mean for every parameter.
    ///
    /// `stdev / sqrt(iteration)`, inflated by `sqrt((1 + rho) / (1 - rho))` when
    /// the lag-1 autocorrelation `rho` lies strictly inside `(-1, 1)`. A negative
    /// variance from rounding is treated as zero.
    pub fn std_error(&self) -> Array1<f64> {
        let n = self.param_sum.len();
        if self.iteration == 0 {
            return Array1::from_elem(n, f64::INFINITY);
        }
        let iter = self.iteration as f64;
        Array1::from_shape_fn(n, |i| {
            let mean = self.param_sum[i] / iter;
            let variance = (self.param_squared_sum[i] / iter - mean * mean).max(0.0);
            let mut std_mean = variance.sqrt() / iter.sqrt();
            let rho = (self.lag1_cross_sum[i] / iter - mean * mean) / variance;
            if rho > -1.0 && rho < 1.0 {
                std_mean *= ((1.0 + rho) / (1.0 - rho)).sqrt();
            }
            std_mean
        })
    }

    /// True when every standard error is at or below its accuracy target.
    pub fn converged(&self, accuracy: &[f64]) -> bool {
        self.std_error()
            .iter()
            .zip(accuracy)
            .all(|(&err, &target)| err <= target)
    }
}
