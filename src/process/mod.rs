//! Environmental process models.
//!
//! Each model maps the current [`EnvironmentField`] and [`ColonyState`] to one
//! [`StressorFactor`] per location. Models are pure: they never mutate their
//! inputs and give identical output for identical input, so they can be
//! evaluated in any order.

mod acidity;
mod flow;
mod light;
mod thermal;

pub use acidity::AcidityModel;
pub use flow::FlowModel;
pub use light::LightModel;
pub use thermal::ThermalModel;

use crate::colony::ColonyState;
use crate::config::Config;
use crate::environment::{EnvironmentField, EnvironmentRecord};
use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// Growth limitation in `[0, 1]`, where 1 means no limitation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct StressorFactor(f64);

impl StressorFactor {
    pub const FULL: Self = Self(0.0);

    /// Clamp `value` into `[0, 1]`.
    pub fn new(value: f64) -> Self {
        debug_assert!(!value.is_nan(), "stressor factor must not be NaN");
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// The closed set of process models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessKind {
    Light,
    Flow,
    Thermal,
    Acidity,
}

impl ProcessKind {
    pub const ALL: [ProcessKind; 4] = [
        ProcessKind::Light,
        ProcessKind::Flow,
        ProcessKind::Thermal,
        ProcessKind::Acidity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProcessKind::Light => "light",
            ProcessKind::Flow => "flow",
            ProcessKind::Thermal => "thermal",
            ProcessKind::Acidity => "acidity",
        }
    }
}

pub trait ProcessModel {
    fn kind(&self) -> ProcessKind;

    /// Evaluate the stressor factor at every location.
    ///
    /// # Errors
    /// [`SimError::InvalidEnvironment`] if an input lies outside its physical
    /// range, [`SimError::GridMismatch`] if the environment and colony grids
    /// differ in length.
    fn evaluate(
        &self,
        env: &EnvironmentField,
        colony: &ColonyState,
    ) -> Result<Vec<StressorFactor>, SimError>;
}

/// Output of all four models for one biological step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factors {
    pub light: Vec<StressorFactor>,
    pub flow: Vec<StressorFactor>,
    pub thermal: Vec<StressorFactor>,
    pub acidity: Vec<StressorFactor>,
    /// Sustained thermal exceedance per location.
    pub bleaching: Vec<bool>,
}

impl Factors {
    pub fn get(&self, kind: ProcessKind) -> &[StressorFactor] {
        match kind {
            ProcessKind::Light => &self.light,
            ProcessKind::Flow => &self.flow,
            ProcessKind::Thermal => &self.thermal,
            ProcessKind::Acidity => &self.acidity,
        }
    }

    fn get_mut(&mut self, kind: ProcessKind) -> &mut Vec<StressorFactor> {
        match kind {
            ProcessKind::Light => &mut self.light,
            ProcessKind::Flow => &mut self.flow,
            ProcessKind::Thermal => &mut self.thermal,
            ProcessKind::Acidity => &mut self.acidity,
        }
    }

    /// The four factors at `location`, in [`ProcessKind::ALL`] order.
    pub fn at(&self, location: usize) -> [f64; 4] {
        ProcessKind::ALL.map(|kind| self.get(kind)[location].value())
    }
}

/// All four process models, configured for a run.
#[derive(Debug, Clone)]
pub struct ProcessSet {
    pub light: LightModel,
    pub flow: FlowModel,
    pub thermal: ThermalModel,
    pub acidity: AcidityModel,
}

impl ProcessSet {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            light: LightModel::new(cfg.light),
            flow: FlowModel::new(cfg.flow),
            thermal: ThermalModel::new(cfg.thermal),
            acidity: AcidityModel::new(cfg.acidity),
        }
    }

    pub fn models(&self) -> [&dyn ProcessModel; 4] {
        [&self.light, &self.flow, &self.thermal, &self.acidity]
    }

    pub fn evaluate(
        &self,
        env: &EnvironmentField,
        colony: &ColonyState,
    ) -> Result<Factors, SimError> {
        let mut factors = Factors {
            light: Vec::new(),
            flow: Vec::new(),
            thermal: Vec::new(),
            acidity: Vec::new(),
            bleaching: Vec::new(),
        };
        for model in self.models() {
            *factors.get_mut(model.kind()) = model.evaluate(env, colony)?;
        }
        factors.bleaching = self.thermal.bleaching(env, colony)?;
        Ok(factors)
    }
}

/// Current records, checked to line up with the colony grid.
fn aligned_records<'a>(
    env: &'a EnvironmentField,
    colony: &ColonyState,
) -> Result<&'a [EnvironmentRecord], SimError> {
    let records = env.current();
    if records.len() != colony.len() {
        return Err(SimError::GridMismatch {
            coral: colony.len(),
            hydro: records.len(),
        });
    }
    Ok(records)
}

fn require(
    valid: bool,
    location: usize,
    variable: &'static str,
    value: f64,
) -> Result<(), SimError> {
    if valid {
        Ok(())
    } else {
        Err(SimError::InvalidEnvironment {
            location,
            variable,
            value,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::colony::{Colony, ThermalTolerance};
    use crate::config::tests::test_config;
    use crate::environment::tests::record;
    use rand::prelude::*;
    use rand_chacha::ChaCha12Rng;

    pub fn colony(n: usize) -> ColonyState {
        let col = Colony {
            cover: 0.1,
            volume: 0.001,
            age: 0.0,
            recruit_eligible: true,
            tolerance: ThermalTolerance {
                lower: 22.0,
                upper: 29.0,
                bleaching_threshold: 30.0,
            },
        };
        ColonyState::new(vec![col; n])
    }

    pub fn field(records: Vec<EnvironmentRecord>) -> EnvironmentField {
        let mut env = EnvironmentField::new(records.len(), 4);
        env.update(records).unwrap();
        env
    }

    fn random_record(rng: &mut ChaCha12Rng) -> EnvironmentRecord {
        EnvironmentRecord {
            irradiance: rng.random_range(0.0..3000.0),
            flow_velocity: rng.random_range(0.0..5.0),
            flow_direction: rng.random_range(-6.3..6.3),
            temperature: rng.random_range(-2.0..40.0),
            aragonite: rng.random_range(0.01..10.0),
            water_depth: rng.random_range(0.0..60.0),
        }
    }

    #[test]
    fn every_factor_in_unit_interval() {
        let set = ProcessSet::from_config(&test_config());
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        for _ in 0..200 {
            let records: Vec<_> = (0..8).map(|_| random_record(&mut rng)).collect();
            let env = field(records);
            let col = colony(8);
            for model in set.models() {
                let factors = model.evaluate(&env, &col).unwrap();
                assert_eq!(factors.len(), 8);
                for factor in factors {
                    let val = factor.value();
                    assert!((0.0..=1.0).contains(&val), "{:?} gave {val}", model.kind());
                }
            }
        }
    }

    #[test]
    fn evaluation_is_deterministic_and_pure() {
        let set = ProcessSet::from_config(&test_config());
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let records: Vec<_> = (0..5).map(|_| random_record(&mut rng)).collect();
        let env = field(records);
        let col = colony(5);
        let env_before = env.clone();
        let col_before = col.clone();

        let first = set.evaluate(&env, &col).unwrap();
        let second = set.evaluate(&env, &col).unwrap();
        assert_eq!(first, second);
        assert_eq!(env, env_before);
        assert_eq!(col, col_before);
    }

    #[test]
    fn models_cover_every_kind() {
        let set = ProcessSet::from_config(&test_config());
        let kinds = set.models().map(|model| model.kind());
        assert_eq!(kinds, ProcessKind::ALL);
    }

    #[test]
    fn set_matches_individual_models() {
        let set = ProcessSet::from_config(&test_config());
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let records: Vec<_> = (0..4).map(|_| random_record(&mut rng)).collect();
        let env = field(records);
        let col = colony(4);
        let factors = set.evaluate(&env, &col).unwrap();
        assert_eq!(factors.light, set.light.evaluate(&env, &col).unwrap());
        assert_eq!(factors.flow, set.flow.evaluate(&env, &col).unwrap());
        assert_eq!(factors.thermal, set.thermal.evaluate(&env, &col).unwrap());
        assert_eq!(factors.acidity, set.acidity.evaluate(&env, &col).unwrap());
        assert_eq!(factors.bleaching, set.thermal.bleaching(&env, &col).unwrap());
    }

    #[test]
    fn rejects_grid_mismatch() {
        let set = ProcessSet::from_config(&test_config());
        let env = field(vec![record(27.0); 2]);
        let err = set.evaluate(&env, &colony(3)).unwrap_err();
        assert_eq!(err, SimError::GridMismatch { coral: 3, hydro: 2 });
    }

    #[test]
    fn factor_is_clamped() {
        assert_eq!(StressorFactor::new(1.3).value(), 1.0);
        assert_eq!(StressorFactor::new(-0.2), StressorFactor::FULL);
    }
}
