//! Hydrodynamic coupling.
//!
//! Solvers are driven through [`CouplingInterface`], a subset of the basic
//! model interface. [`HydroCoupler`] wraps a solver and enforces the exchange
//! protocol used by the engine.

mod coupler;
mod prescribed;
mod reef1d;

pub use coupler::HydroCoupler;
pub use prescribed::Prescribed;
pub use reef1d::Reef1D;

#[cfg(test)]
pub(crate) use coupler::tests::{Call, ScriptedSolver};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Time-stepped external solver.
///
/// Time is measured in days. Variable names are solver-defined.
pub trait CouplingInterface {
    fn name(&self) -> &str;

    /// Prepare the solver from its settings table.
    fn initialize(&mut self, settings: &toml::Table) -> Result<()>;

    /// Advance the solver clock by `dt` days.
    fn update(&mut self, dt: f64) -> Result<()>;

    /// Copy of the current values of `name`, one per grid cell.
    fn get_value(&self, name: &str) -> Result<Vec<f64>>;

    fn set_value(&mut self, name: &str, values: &[f64]) -> Result<()>;

    fn get_current_time(&self) -> f64;

    fn get_grid_size(&self) -> usize;

    /// Cross-shore position of each cell (m), for solvers with a spatial
    /// layout.
    fn get_x_coordinate(&self) -> Option<Vec<f64>> {
        None
    }

    fn finalize(&mut self) -> Result<()>;
}

/// Solver fields at one solver time, owned by the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydroExchangeRecord {
    /// Solver clock (days).
    pub time: f64,
    pub flow_velocity: Vec<f64>,
    pub flow_direction: Vec<f64>,
    pub temperature: Vec<f64>,
    pub water_depth: Vec<f64>,
}

/// Construct a solver by name.
pub fn build_solver(name: &str) -> Result<Box<dyn CouplingInterface>> {
    match name {
        "reef1d" => Ok(Box::new(Reef1D::default())),
        "prescribed" => Ok(Box::new(Prescribed::default())),
        _ => bail!("unknown hydrodynamic solver {name:?}"),
    }
}

fn check_len(name: &str, values: &[f64], exp_len: usize) -> Result<()> {
    let len = values.len();
    if len != exp_len {
        bail!("{name} must have {exp_len} values, but has {len}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_known_solvers() {
        assert_eq!(build_solver("reef1d").unwrap().name(), "reef1d");
        assert_eq!(build_solver("prescribed").unwrap().name(), "prescribed");
        assert!(build_solver("delft3d").is_err());
    }
}
