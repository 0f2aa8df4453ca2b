//! Per-step simulation output.

use crate::colony::ColonyState;
use crate::growth::StepEvents;
use crate::process::Factors;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

/// Record of the simulation after one biological step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Index of the completed biological step.
    pub step: usize,
    /// Biological time at the end of the step (years).
    pub time_years: f64,
    /// Solver clock when the fields were fetched (days).
    pub hydro_time: f64,
    pub colony: ColonyState,
    pub factors: Factors,
    pub events: StepEvents,
}

/// Append-only buffer of [`HistoryRecord`]s.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HistoryStore {
    records: Vec<HistoryRecord>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Encode the store as a record count followed by the records.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        encode::write(writer, &self.records.len()).context("failed to serialize record count")?;
        for record in &self.records {
            encode::write(writer, record)
                .with_context(|| format!("failed to serialize record {}", record.step))?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let n_records: usize =
            decode::from_read(&mut *reader).context("failed to deserialize record count")?;
        let mut records = Vec::new();
        for i_rec in 0..n_records {
            let record = decode::from_read(&mut *reader)
                .with_context(|| format!("failed to deserialize record {i_rec}"))?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}
