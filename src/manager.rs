use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::{CancelToken, Engine, RunOutcome};
use crate::grid::InitialCondition;
use crate::hydro::build_solver;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg = Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Perform a new run in the next free run directory.
    ///
    /// The history is saved even when the run fails part way.
    pub fn run_simulation(&self, cancel: &CancelToken) -> Result<()> {
        let initial_file = self.sim_dir.join("initial.toml");
        let initial = InitialCondition::from_file(&initial_file, &self.cfg.thermal)
            .with_context(|| format!("failed to load {initial_file:?}"))?;
        let solver = build_solver(&self.cfg.hydro.solver).context("failed to build solver")?;

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::initialize(self.cfg.clone(), initial, solver)
            .context("failed to initialize engine")?;
        log::info!("running {} sites", engine.grid().len());
        let outcome = engine.run(cancel);
        log::info!(
            "run {run_idx} stopped in {:?} after {} biological steps with mean cover {:.4}",
            engine.phase(),
            engine.clock().bio_steps(),
            engine.colony().mean_cover()
        );
        if let Err(err) = &outcome {
            let locations = err.locations();
            if !locations.is_empty() {
                log::error!("offending locations: {locations:?}");
            }
        }

        let history_file = self.history_file(run_idx);
        engine
            .history()
            .save(&history_file)
            .context("failed to save history")?;
        log::info!("saved {} records to {history_file:?}", engine.history().len());

        match outcome.context("failed to run simulation")? {
            RunOutcome::Completed => {}
            RunOutcome::Cancelled { completed_steps } => {
                log::warn!("run {run_idx} stopped after {completed_steps} steps");
            }
        }
        Ok(())
    }

    pub fn run_analysis(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new();

            analyzer
                .add_file(self.history_file(run_idx))
                .context("failed to add file")?;

            let results_file = self.results_file(run_idx);
            analyzer
                .save_results(&results_file)
                .context("failed to save results")?;
            log::info!("saved {results_file:?}");
        }

        Ok(())
    }

    /// Remove every run directory.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn history_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("history.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.json")
    }
}
