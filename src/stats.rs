use serde::{Deserialize, Serialize};

/// Running mean, variance, and range of a stream of values.
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    pub fn report(&self) -> AccumulatorReport {
        if self.n_vals == 0 {
            return AccumulatorReport {
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        AccumulatorReport {
            mean: self.mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
            min: self.min,
            max: self.max,
        }
    }
}

/// Values sampled at increasing times.
pub struct TimeSeries {
    times: Vec<f64>,
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub n_vals: usize,
    pub initial: f64,
    pub last: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    /// Least-squares slope per unit time.
    pub trend: f64,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self {
            times: Vec::new(),
            vals: Vec::new(),
        }
    }

    pub fn push(&mut self, time: f64, val: f64) {
        self.times.push(time);
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        TimeSeriesReport {
            n_vals: self.vals.len(),
            initial: self.vals.first().copied().unwrap_or(f64::NAN),
            last: self.vals.last().copied().unwrap_or(f64::NAN),
            mean: compute_mean(&self.vals),
            std_dev: compute_var(&self.vals).sqrt(),
            sem: compute_sem(&self.vals),
            trend: compute_trend(&self.times, &self.vals),
        }
    }
}

fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn compute_var(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = compute_mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}

/// Standard error of the mean of a correlated series, by repeated blocking.
///
/// Takes the largest estimate over all block levels with at least four blocks.
fn compute_sem(vals: &[f64]) -> f64 {
    let mut blocks = vals.to_vec();
    let mut sem = f64::NAN;
    while blocks.len() >= 4 {
        let est = (compute_var(&blocks) / blocks.len() as f64).sqrt();
        if sem.is_nan() || est > sem {
            sem = est;
        }
        blocks = blocks
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect();
    }
    sem
}

fn compute_trend(times: &[f64], vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return f64::NAN;
    }
    let t_mean = compute_mean(times);
    let v_mean = compute_mean(vals);
    let (cov, t_var) = times
        .iter()
        .zip(vals)
        .fold((0.0, 0.0), |(cov, t_var), (&t, &v)| {
            let dt = t - t_mean;
            (cov + dt * (v - v_mean), t_var + dt * dt)
        });
    if t_var == 0.0 {
        return f64::NAN;
    }
    cov / t_var
}
