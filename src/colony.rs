//! Coral population state per location.

use serde::{Deserialize, Serialize};

/// Thermal tolerance window of a colony (°C).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalTolerance {
    pub lower: f64,
    pub upper: f64,
    /// Hard threshold above which exceedance is counted towards bleaching.
    pub bleaching_threshold: f64,
}

/// Coral attributes at a single location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colony {
    /// Live cover fraction in `[0, 1]`.
    pub cover: f64,
    /// Colony volume (m³), never negative.
    pub volume: f64,
    /// Years since the colony was established.
    pub age: f64,
    /// Substrate can host new recruits.
    pub recruit_eligible: bool,
    pub tolerance: ThermalTolerance,
}

impl Colony {
    /// Representative colony height (m) used for bed roughness.
    pub fn height(&self) -> f64 {
        self.volume.cbrt()
    }
}

/// Coral population over the whole grid, ordered by location index.
///
/// Only the growth integrator mutates it, once per biological step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyState {
    colonies: Vec<Colony>,
}

impl ColonyState {
    pub fn new(colonies: Vec<Colony>) -> Self {
        Self { colonies }
    }

    pub fn len(&self) -> usize {
        self.colonies.len()
    }

    pub fn colonies(&self) -> &[Colony] {
        &self.colonies
    }

    pub(crate) fn colonies_mut(&mut self) -> &mut [Colony] {
        &mut self.colonies
    }

    pub fn covers(&self) -> Vec<f64> {
        self.colonies.iter().map(|col| col.cover).collect()
    }

    pub fn mean_cover(&self) -> f64 {
        if self.colonies.is_empty() {
            return 0.0;
        }
        self.colonies.iter().map(|col| col.cover).sum::<f64>() / self.colonies.len() as f64
    }
}
