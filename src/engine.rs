use crate::colony::ColonyState;
use crate::config::Config;
use crate::environment::EnvironmentField;
use crate::error::SimError;
use crate::grid::{Grid, InitialCondition};
use crate::growth::GrowthIntegrator;
use crate::history::{HistoryRecord, HistoryStore};
use crate::hydro::{CouplingInterface, HydroCoupler};
use crate::process::ProcessSet;
use anyhow::Result;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;

/// Stage of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    SteppingHydro,
    SteppingBio,
    Finalizing,
    Failed,
}

/// Shared flag used to stop a run between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a call to [`Engine::run`] ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled { completed_steps: usize },
}

/// Failure of a run, with the step and phase it happened in.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("simulation failed at biological step {step} while {phase:?}")]
pub struct RunError {
    pub step: usize,
    pub phase: Phase,
    #[source]
    pub source: SimError,
}

impl RunError {
    pub fn locations(&self) -> Vec<usize> {
        self.source.locations()
    }
}

/// Step counters of the two coupled clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationClock {
    steps_per_bio: usize,
    hydro_steps: u64,
    sub_steps: usize,
    bio_steps: usize,
}

impl SimulationClock {
    fn new(steps_per_bio: usize) -> Self {
        Self {
            steps_per_bio,
            hydro_steps: 0,
            sub_steps: 0,
            bio_steps: 0,
        }
    }

    /// Hydrodynamic steps per biological step.
    pub fn steps_per_bio(&self) -> usize {
        self.steps_per_bio
    }

    pub fn hydro_steps(&self) -> u64 {
        self.hydro_steps
    }

    /// Completed biological steps.
    pub fn bio_steps(&self) -> usize {
        self.bio_steps
    }

    fn tick_hydro(&mut self) {
        self.hydro_steps += 1;
        self.sub_steps += 1;
    }

    fn bio_step_ready(&self) -> bool {
        self.sub_steps == self.steps_per_bio
    }

    fn tick_bio(&mut self) {
        self.sub_steps = 0;
        self.bio_steps += 1;
    }
}

/// Simulation engine.
///
/// Owns every piece of run state and drives the hydrodynamic and biological
/// clocks in lockstep: each biological step is preceded by exactly
/// `hydro_steps_per_bio` solver updates and a single field exchange.
pub struct Engine {
    cfg: Config,
    grid: Grid,
    colony: ColonyState,
    env: EnvironmentField,
    processes: ProcessSet,
    integrator: GrowthIntegrator,
    coupler: HydroCoupler,
    clock: SimulationClock,
    history: HistoryStore,
    rng: ChaCha12Rng,
    phase: Phase,
    failure: Option<RunError>,
}

impl Engine {
    /// Connect `solver` and set up the run from `cfg` and `initial`.
    pub fn initialize(
        cfg: Config,
        initial: InitialCondition,
        solver: Box<dyn CouplingInterface>,
    ) -> Result<Self> {
        let init_err = |source| RunError {
            step: 0,
            phase: Phase::Initializing,
            source,
        };

        if cfg.run.hydro_steps_per_bio == 0 {
            return Err(init_err(SimError::InvalidStep {
                reason: "a biological step needs at least one hydrodynamic step".into(),
            })
            .into());
        }

        let InitialCondition { grid, colony } = initial;
        let coupler =
            HydroCoupler::connect(solver, &cfg.hydro, cfg.run.hydro_dt_days, cfg.run.feedback)
                .map_err(init_err)?;
        if coupler.grid_size() != grid.len() {
            return Err(init_err(SimError::GridMismatch {
                coral: grid.len(),
                hydro: coupler.grid_size(),
            })
            .into());
        }
        if let Some(x_coordinate) = coupler.x_coordinate() {
            check_coordinates(&grid, &x_coordinate).map_err(init_err)?;
        }

        let processes = ProcessSet::from_config(&cfg);
        let integrator =
            GrowthIntegrator::new(cfg.growth, cfg.recruitment, cfg.run.combination)?;
        let env = EnvironmentField::new(grid.len(), cfg.thermal.exceedance_steps);
        let clock = SimulationClock::new(cfg.run.hydro_steps_per_bio);
        let rng = ChaCha12Rng::seed_from_u64(cfg.run.seed);

        log::info!(
            "initialized engine with {} locations, {} x {} d hydrodynamic steps per biological step",
            grid.len(),
            clock.steps_per_bio(),
            cfg.run.hydro_dt_days
        );

        Ok(Self {
            cfg,
            grid,
            colony,
            env,
            processes,
            integrator,
            coupler,
            clock,
            history: HistoryStore::new(),
            rng,
            phase: Phase::Initializing,
            failure: None,
        })
    }

    /// Run until the biological horizon, a failure, or cancellation.
    ///
    /// Cancellation is honoured at the start of each hydrodynamic cycle and
    /// before each biological step. A cancelled run can be resumed by calling
    /// `run` again.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<RunOutcome, RunError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.phase == Phase::Finalizing {
            return Ok(RunOutcome::Completed);
        }

        loop {
            let next = match self.phase {
                Phase::Initializing => {
                    if self.cfg.run.n_bio_steps == 0 {
                        Phase::Finalizing
                    } else {
                        Phase::SteppingHydro
                    }
                }
                Phase::SteppingHydro => {
                    if self.clock.sub_steps == 0 && cancel.is_cancelled() {
                        return Ok(self.cancelled());
                    }
                    self.step_hydro().map_err(|source| self.fail(source))?
                }
                Phase::SteppingBio => {
                    if cancel.is_cancelled() {
                        return Ok(self.cancelled());
                    }
                    self.step_bio().map_err(|source| self.fail(source))?
                }
                Phase::Finalizing => {
                    self.coupler
                        .finalize()
                        .map_err(|source| self.fail(source))?;
                    log::info!(
                        "finished {} biological steps ({} hydrodynamic)",
                        self.clock.bio_steps(),
                        self.clock.hydro_steps()
                    );
                    return Ok(RunOutcome::Completed);
                }
                Phase::Failed => {
                    return Err(self.fail(SimError::Coupling {
                        time: self.coupler.time(),
                        reason: "engine entered the failed state without an error".into(),
                    }));
                }
            };
            self.phase = next;
        }
    }

    fn step_hydro(&mut self) -> Result<Phase, SimError> {
        self.coupler.advance(1)?;
        self.clock.tick_hydro();
        if !self.clock.bio_step_ready() {
            return Ok(Phase::SteppingHydro);
        }

        let hydro = self.coupler.fetch_fields()?;
        log::debug!(
            "fetched hydrodynamic fields after {} steps at t = {} d",
            self.coupler.n_steps(),
            hydro.time
        );
        let step = self.clock.bio_steps();
        let forcing = &self.cfg.forcing;
        self.env.assimilate(
            hydro,
            forcing.surface_irradiance_at(step),
            forcing.aragonite_at(step),
        )?;
        Ok(Phase::SteppingBio)
    }

    fn step_bio(&mut self) -> Result<Phase, SimError> {
        let dt = self.cfg.run.bio_dt_years();
        let factors = self.processes.evaluate(&self.env, &self.colony)?;
        let events = self
            .integrator
            .integrate(&mut self.colony, &factors, dt, &mut self.rng)?;

        let step = self.clock.bio_steps();
        self.clock.tick_bio();
        self.history.append(HistoryRecord {
            step,
            time_years: self.clock.bio_steps() as f64 * dt,
            hydro_time: self.coupler.time(),
            colony: self.colony.clone(),
            factors,
            events,
        });
        log::debug!(
            "step {step}: mean cover {:.4}, {} recruits, {} bleached",
            self.colony.mean_cover(),
            events.recruits,
            events.bleached
        );

        self.coupler.push_feedback(&self.colony)?;

        let n_bio_steps = self.cfg.run.n_bio_steps;
        let progress = 100.0 * self.clock.bio_steps() as f64 / n_bio_steps as f64;
        log::info!("completed {progress:06.2}%");

        if self.clock.bio_steps() < n_bio_steps {
            Ok(Phase::SteppingHydro)
        } else {
            Ok(Phase::Finalizing)
        }
    }

    fn cancelled(&self) -> RunOutcome {
        let completed_steps = self.clock.bio_steps();
        log::warn!("run cancelled after {completed_steps} biological steps");
        RunOutcome::Cancelled { completed_steps }
    }

    fn fail(&mut self, source: SimError) -> RunError {
        let err = RunError {
            step: self.clock.bio_steps(),
            phase: self.phase,
            source,
        };
        log::error!("{err}: {}", err.source);
        self.phase = Phase::Failed;
        self.failure = Some(err.clone());
        err
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn colony(&self) -> &ColonyState {
        &self.colony
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }
}

/// Relative tolerance when matching site positions to solver cells.
const COORD_TOL: f64 = 1e-6;

/// Check that every site lies on the solver cell with the same index.
fn check_coordinates(grid: &Grid, x_coordinate: &[f64]) -> Result<(), SimError> {
    if x_coordinate.len() != grid.len() {
        return Err(SimError::GridMismatch {
            coral: grid.len(),
            hydro: x_coordinate.len(),
        });
    }
    for (location, (site, &x_cell)) in grid.sites().iter().zip(x_coordinate).enumerate() {
        if (site.x - x_cell).abs() > COORD_TOL * x_cell.abs().max(1.0) {
            return Err(SimError::SiteMismatch {
                location,
                coral: site.x,
                hydro: x_cell,
            });
        }
    }
    Ok(())
}
