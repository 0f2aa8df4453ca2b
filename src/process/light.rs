use super::{ProcessKind, ProcessModel, StressorFactor, aligned_records, require};
use crate::colony::ColonyState;
use crate::config::LightParams;
use crate::environment::EnvironmentField;
use crate::error::SimError;

/// Photosynthetic light limitation.
///
/// Surface irradiance is attenuated with depth following Lambert-Beer,
/// `I_z = I_0 exp(-K_d h)`, and the limitation saturates as
/// `tanh(I_z / I_k)`.
#[derive(Debug, Clone)]
pub struct LightModel {
    params: LightParams,
}

impl LightModel {
    pub fn new(params: LightParams) -> Self {
        Self { params }
    }

    pub fn subsurface_irradiance(&self, surface: f64, depth: f64) -> f64 {
        surface * (-self.params.extinction_coefficient * depth).exp()
    }
}

impl ProcessModel for LightModel {
    fn kind(&self) -> ProcessKind {
        ProcessKind::Light
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
                rec.irradiance.is_finite() && rec.irradiance >= 0.0,
                loc,
                "irradiance",
                rec.irradiance,
            )?;
            require(
                rec.water_depth.is_finite() && rec.water_depth >= 0.0,
                loc,
                "water depth",
                rec.water_depth,
            )?;

            let irradiance = self.subsurface_irradiance(rec.irradiance, rec.water_depth);
            factors.push(StressorFactor::new(
                (irradiance / self.params.saturation_irradiance).tanh(),
            ));
        }
        Ok(factors)
    }
}
