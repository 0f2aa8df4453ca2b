use super::{ProcessKind, ProcessModel, StressorFactor, aligned_records, require};
use crate::colony::ColonyState;
use crate::config::AcidityParams;
use crate::environment::EnvironmentField;
use crate::error::SimError;

/// Calcification limitation by aragonite saturation state,
/// `(Ω - Ω₀) / (κ + Ω - Ω₀)`, zero at or below `Ω₀`.
#[derive(Debug, Clone)]
pub struct AcidityModel {
    params: AcidityParams,
}

impl AcidityModel {
    pub fn new(params: AcidityParams) -> Self {
        Self { params }
    }
}

impl ProcessModel for AcidityModel {
    fn kind(&self) -> ProcessKind {
        ProcessKind::Acidity
    }

    fn evaluate(
        &self,
        env: &EnvironmentField,
        colony: &ColonyState,
    ) -> Result<Vec<StressorFactor>, SimError> {
        let records = aligned_records(env, colony)?;
        let mut factors = Vec::with_capacity(records.len());
        for (loc, rec) in records.iter().enumerate() {
            require(
                rec.aragonite.is_finite() && rec.aragonite > 0.0,
                loc,
                "aragonite saturation",
                rec.aragonite,
            )?;

            let excess = rec.aragonite - self.params.omega_0;
            let factor = if excess <= 0.0 {
                StressorFactor::FULL
            } else {
                StressorFactor::new(excess / (self.params.kappa + excess))
            };
            factors.push(factor);
        }
        Ok(factors)
    }
}
