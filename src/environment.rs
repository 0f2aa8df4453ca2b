//! Environmental conditions per location, current and recent.

use crate::error::SimError;
use crate::hydro::HydroExchangeRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Environmental variables at a single location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    /// Surface irradiance (µmol photons m⁻² s⁻¹).
    pub irradiance: f64,
    /// Flow velocity magnitude (m/s).
    pub flow_velocity: f64,
    /// Flow direction (rad).
    pub flow_direction: f64,
    /// Water temperature (°C).
    pub temperature: f64,
    /// Aragonite saturation state.
    pub aragonite: f64,
    /// Water depth above the colony (m).
    pub water_depth: f64,
}

/// Per-location environment, one record set per biological step.
///
/// Keeps the most recent `capacity` record sets; the last one is current.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentField {
    n_locations: usize,
    capacity: usize,
    history: VecDeque<Vec<EnvironmentRecord>>,
}

impl EnvironmentField {
    pub fn new(n_locations: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            n_locations,
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Number of record sets currently tracked.
    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    /// Records of the current step, empty before the first update.
    pub fn current(&self) -> &[EnvironmentRecord] {
        self.history.back().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record sets from newest to oldest.
    pub fn recent(&self) -> impl Iterator<Item = &[EnvironmentRecord]> {
        self.history.iter().rev().map(Vec::as_slice)
    }

    /// Push a new record set, dropping the oldest beyond capacity.
    pub fn update(&mut self, records: Vec<EnvironmentRecord>) -> Result<(), SimError> {
        if records.len() != self.n_locations {
            return Err(SimError::GridMismatch {
                coral: self.n_locations,
                hydro: records.len(),
            });
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(records);
        Ok(())
    }

    /// Take ownership of a solver snapshot and merge it with the external forcing.
    pub fn assimilate(
        &mut self,
        hydro: HydroExchangeRecord,
        surface_irradiance: f64,
        aragonite: f64,
    ) -> Result<(), SimError> {
        let HydroExchangeRecord {
            flow_velocity,
            flow_direction,
            temperature,
            water_depth,
            ..
        } = hydro;

        let records = flow_velocity
            .into_iter()
            .zip(flow_direction)
            .zip(temperature)
            .zip(water_depth)
            .map(
                |(((flow_velocity, flow_direction), temperature), water_depth)| EnvironmentRecord {
                    irradiance: surface_irradiance,
                    flow_velocity,
                    flow_direction,
                    temperature,
                    aragonite,
                    water_depth,
                },
            )
            .collect();
        self.update(records)
    }

    /// Consecutive most recent steps at `location` for which `pred` holds.
    pub fn trailing_count<F>(&self, location: usize, pred: F) -> usize
    where
        F: Fn(&EnvironmentRecord) -> bool,
    {
        self.recent()
            .take_while(|recs| recs.get(location).is_some_and(&pred))
            .count()
    }
}
