use super::{ProcessKind, ProcessModel, StressorFactor, aligned_records, require};
use crate::colony::ColonyState;
use crate::config::ThermalParams;
use crate::environment::EnvironmentField;
use crate::error::SimError;

/// Seawater temperatures outside this range indicate corrupt input (°C).
const MIN_TEMPERATURE: f64 = -2.5;
const MAX_TEMPERATURE: f64 = 45.0;

/// Thermal limitation and bleaching.
///
/// The factor is 1 inside each colony's tolerance band and decays as a
/// Gaussian of the distance to the band outside it. Bleaching is signalled
/// once the temperature has stayed above the colony's hard threshold for
/// `exceedance_steps` consecutive biological steps.
#[derive(Debug, Clone)]
pub struct ThermalModel {
    params: ThermalParams,
}

impl ThermalModel {
    pub fn new(params: ThermalParams) -> Self {
        Self { params }
    }

    /// Bleaching signal per location, derived from the environment history.
    pub fn bleaching(
        &self,
        env: &EnvironmentField,
        colony: &ColonyState,
    ) -> Result<Vec<bool>, SimError> {
        aligned_records(env, colony)?;
        let signal = colony
            .colonies()
            .iter()
            .enumerate()
            .map(|(loc, col)| {
                let threshold = col.tolerance.bleaching_threshold;
                env.trailing_count(loc, |rec| rec.temperature > threshold)
                    >= self.params.exceedance_steps
            })
            .collect();
        Ok(signal)
    }
}

impl ProcessModel for ThermalModel {
    fn kind(&self) -> ProcessKind {
        ProcessKind::Thermal
    }

    fn evaluate(
        &self,
        env: &EnvironmentField,
        colony: &ColonyState,
    ) -> Result<Vec<StressorFactor>, SimError> {
        let records = aligned_records(env, colony)?;
        let mut factors = Vec::with_capacity(records.len());
        for (loc, (rec, col)) in records.iter().zip(colony.colonies()).enumerate() {
            let temp = rec.temperature;
            require(
                (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temp),
                loc,
                "temperature",
                temp,
            )?;

            let tol = &col.tolerance;
            let excess = if temp < tol.lower {
                tol.lower - temp
            } else if temp > tol.upper {
                temp - tol.upper
            } else {
                0.0
            };
            let scaled = excess / self.params.degradation_width;
            factors.push(StressorFactor::new((-scaled * scaled).exp()));
        }
        Ok(factors)
    }
}
