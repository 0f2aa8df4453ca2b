//! Error taxonomy of the simulation core.

use thiserror::Error;

/// Failure raised by a simulation component.
///
/// None of these are recoverable within a run: the orchestrator stops at the
/// first one and keeps the history gathered so far.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A physical input is outside its valid range.
    #[error("invalid {variable} at location {location}: {value}")]
    InvalidEnvironment {
        location: usize,
        variable: &'static str,
        value: f64,
    },

    /// The solver failed to advance or reported a diverged state.
    #[error("coupling failure at solver time {time}: {reason}")]
    Coupling { time: f64, reason: String },

    /// Fields were requested before the solver was ever advanced.
    #[error("hydrodynamic fields requested before any advance")]
    StaleState,

    /// The hydrodynamic clock would move by a non-integer number of steps.
    #[error("invalid hydrodynamic step: {reason}")]
    InvalidStep { reason: String },

    /// Coral and hydrodynamic grids have different sizes.
    #[error("coral grid has {coral} locations but hydrodynamic grid has {hydro}")]
    GridMismatch { coral: usize, hydro: usize },

    /// A coral site does not lie on the hydrodynamic cell it is mapped to.
    #[error("site {location} is at x = {coral} m but its hydrodynamic cell is at x = {hydro} m")]
    SiteMismatch {
        location: usize,
        coral: f64,
        hydro: f64,
    },
}

impl SimError {
    /// Locations implicated by this error, if any.
    pub fn locations(&self) -> Vec<usize> {
        match self {
            SimError::InvalidEnvironment { location, .. }
            | SimError::SiteMismatch { location, .. } => vec![*location],
            _ => Vec::new(),
        }
    }
}
