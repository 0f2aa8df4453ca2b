use super::{CouplingInterface, HydroExchangeRecord};
use crate::colony::ColonyState;
use crate::config::{HydroConfig, RoughnessParams, VariableNames};
use crate::error::SimError;

/// Relative tolerance when comparing solver clock values.
const CLOCK_TOL: f64 = 1e-9;

/// Owns a solver and exchanges state with it.
///
/// The solver clock only ever moves by whole hydrodynamic steps.
pub struct HydroCoupler {
    solver: Box<dyn CouplingInterface>,
    vars: VariableNames,
    roughness: RoughnessParams,
    step_size: f64,
    feedback: bool,
    start_time: f64,
    n_steps: u64,
}

impl HydroCoupler {
    /// Initialize `solver` and wrap it.
    ///
    /// `step_size` is the length of one hydrodynamic step in days.
    pub fn connect(
        mut solver: Box<dyn CouplingInterface>,
        cfg: &HydroConfig,
        step_size: f64,
        feedback: bool,
    ) -> Result<Self, SimError> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(SimError::InvalidStep {
                reason: format!("step size must be positive, but is {step_size}"),
            });
        }
        solver
            .initialize(&cfg.settings)
            .map_err(|err| SimError::Coupling {
                time: 0.0,
                reason: format!("failed to initialize {}: {err:#}", solver.name()),
            })?;
        let start_time = solver.get_current_time();
        log::info!(
            "initialized {} solver with {} cells at t = {start_time} d",
            solver.name(),
            solver.get_grid_size()
        );

        Ok(Self {
            solver,
            vars: cfg.variables.clone(),
            roughness: cfg.roughness,
            step_size,
            feedback,
            start_time,
            n_steps: 0,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.solver.get_grid_size()
    }

    /// Cell positions, if the solver reports them.
    pub fn x_coordinate(&self) -> Option<Vec<f64>> {
        self.solver.get_x_coordinate()
    }

    /// Hydrodynamic steps taken so far.
    pub fn n_steps(&self) -> u64 {
        self.n_steps
    }

    pub fn time(&self) -> f64 {
        self.solver.get_current_time()
    }

    /// Advance the solver by `n_steps` whole hydrodynamic steps.
    pub fn advance(&mut self, n_steps: usize) -> Result<(), SimError> {
        if n_steps == 0 {
            return Err(SimError::InvalidStep {
                reason: "cannot advance by zero steps".into(),
            });
        }
        for _ in 0..n_steps {
            let time = self.time();
            self.solver
                .update(self.step_size)
                .map_err(|err| SimError::Coupling {
                    time,
                    reason: format!("{err:#}"),
                })?;
            self.n_steps += 1;
            self.check_clock()?;
        }
        Ok(())
    }

    fn check_clock(&self) -> Result<(), SimError> {
        let actual = self.time();
        if !actual.is_finite() {
            return Err(SimError::Coupling {
                time: actual,
                reason: "solver clock diverged".into(),
            });
        }
        let expected = self.start_time + self.n_steps as f64 * self.step_size;
        if (actual - expected).abs() > CLOCK_TOL * expected.abs().max(1.0) {
            return Err(SimError::InvalidStep {
                reason: format!("solver clock at {actual} d, expected {expected} d"),
            });
        }
        Ok(())
    }

    /// Copy the current solver fields.
    pub fn fetch_fields(&self) -> Result<HydroExchangeRecord, SimError> {
        if self.n_steps == 0 {
            return Err(SimError::StaleState);
        }
        Ok(HydroExchangeRecord {
            time: self.time(),
            flow_velocity: self.fetch(&self.vars.flow_velocity)?,
            flow_direction: self.fetch(&self.vars.flow_direction)?,
            temperature: self.fetch(&self.vars.water_temperature)?,
            water_depth: self.fetch(&self.vars.water_depth)?,
        })
    }

    fn fetch(&self, name: &str) -> Result<Vec<f64>, SimError> {
        let values = self.solver.get_value(name).map_err(|err| SimError::Coupling {
            time: self.time(),
            reason: format!("failed to get {name}: {err:#}"),
        })?;
        let exp_len = self.grid_size();
        if values.len() != exp_len {
            return Err(SimError::Coupling {
                time: self.time(),
                reason: format!("{name} has {} values, expected {exp_len}", values.len()),
            });
        }
        Ok(values)
    }

    /// Send coral cover and the bed roughness it implies to the solver.
    ///
    /// Does nothing in one-way coupling mode.
    pub fn push_feedback(&mut self, colony: &ColonyState) -> Result<(), SimError> {
        if !self.feedback {
            return Ok(());
        }
        let cover = colony.covers();
        let roughness: Vec<f64> = colony
            .colonies()
            .iter()
            .map(|col| self.roughness.base + self.roughness.coefficient * col.cover * col.height())
            .collect();

        let time = self.time();
        for (name, values) in [
            (&self.vars.coral_cover, &cover),
            (&self.vars.bed_roughness, &roughness),
        ] {
            self.solver
                .set_value(name, values)
                .map_err(|err| SimError::Coupling {
                    time,
                    reason: format!("failed to set {name}: {err:#}"),
                })?;
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), SimError> {
        let time = self.time();
        self.solver.finalize().map_err(|err| SimError::Coupling {
            time,
            reason: format!("failed to finalize: {err:#}"),
        })
    }
}
