use crate::history::{HistoryRecord, HistoryStore};
use crate::process::ProcessKind;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use std::{fs::File, io::BufWriter, path::Path};

/// Quantity measured over a run history.
pub trait Obs {
    fn update(&mut self, rec: &HistoryRecord);
    fn report(&self) -> serde_json::Value;
}

/// Domain-mean coral cover over biological time.
pub struct MeanCover {
    time_series: TimeSeries,
}

impl MeanCover {
    pub fn new() -> Self {
        Self {
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for MeanCover {
    fn update(&mut self, rec: &HistoryRecord) {
        self.time_series.push(rec.time_years, rec.colony.mean_cover());
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "mean_cover": self.time_series.report() })
    }
}

/// Cover and volume of every location at the last recorded step.
pub struct FinalState {
    cover: Vec<f64>,
    volume: Vec<f64>,
}

impl FinalState {
    pub fn new() -> Self {
        Self {
            cover: Vec::new(),
            volume: Vec::new(),
        }
    }
}

impl Obs for FinalState {
    fn update(&mut self, rec: &HistoryRecord) {
        self.cover = rec.colony.covers();
        self.volume = rec.colony.colonies().iter().map(|col| col.volume).collect();
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "final_state": { "cover": self.cover, "volume": self.volume }
        })
    }
}

/// Distribution of the domain-mean factor of each process.
pub struct MeanFactors {
    acc_vec: Vec<Accumulator>,
}

impl MeanFactors {
    pub fn new() -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(ProcessKind::ALL.len(), Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for MeanFactors {
    fn update(&mut self, rec: &HistoryRecord) {
        for (kind, acc) in ProcessKind::ALL.iter().zip(&mut self.acc_vec) {
            let factors = rec.factors.get(*kind);
            if factors.is_empty() {
                continue;
            }
            let sum: f64 = factors.iter().map(|factor| factor.value()).sum();
            acc.add(sum / factors.len() as f64);
        }
    }

    fn report(&self) -> serde_json::Value {
        let reports: serde_json::Map<_, _> = ProcessKind::ALL
            .iter()
            .zip(&self.acc_vec)
            .map(|(kind, acc)| (kind.name().to_string(), serde_json::json!(acc.report())))
            .collect();
        serde_json::json!({ "mean_factors": reports })
    }
}

/// Totals of recruitment and bleaching events.
pub struct EventCounts {
    recruits: usize,
    bleached: usize,
    bleaching_steps: usize,
}

impl EventCounts {
    pub fn new() -> Self {
        Self {
            recruits: 0,
            bleached: 0,
            bleaching_steps: 0,
        }
    }
}

impl Obs for EventCounts {
    fn update(&mut self, rec: &HistoryRecord) {
        self.recruits += rec.events.recruits;
        self.bleached += rec.events.bleached;
        if rec.events.bleached > 0 {
            self.bleaching_steps += 1;
        }
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "events": {
                "recruits": self.recruits,
                "bleached": self.bleached,
                "bleaching_steps": self.bleaching_steps,
            }
        })
    }
}

pub struct Analyzer {
    n_steps: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(MeanCover::new()),
            Box::new(FinalState::new()),
            Box::new(MeanFactors::new()),
            Box::new(EventCounts::new()),
        ];
        Self {
            n_steps: 0,
            obs_ptr_vec,
        }
    }

    pub fn add_history(&mut self, history: &HistoryStore) {
        for rec in history.records() {
            for obs in &mut self.obs_ptr_vec {
                obs.update(rec);
            }
            self.n_steps += 1;
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let history = HistoryStore::load(file).context("failed to load history")?;
        self.add_history(&history);
        Ok(())
    }

    pub fn results(&self) -> serde_json::Value {
        let mut reports = vec![serde_json::json!({ "completed_steps": self.n_steps })];
        reports.extend(self.obs_ptr_vec.iter().map(|obs| obs.report()));
        serde_json::Value::Array(reports)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.results())
            .context("failed to serialize results")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::StepEvents;
    use crate::process::tests::colony;
    use crate::process::{Factors, StressorFactor};

    fn history(covers: &[f64]) -> HistoryStore {
        let mut store = HistoryStore::new();
        for (step, &cover) in covers.iter().enumerate() {
            let mut col = colony(2);
            for c in col.colonies_mut() {
                c.cover = cover;
            }
            let factors = |val| vec![StressorFactor::new(val); 2];
            store.append(HistoryRecord {
                step,
                time_years: step as f64 + 1.0,
                hydro_time: 365.25 * (step as f64 + 1.0),
                colony: col,
                factors: Factors {
                    light: factors(1.0),
                    flow: factors(0.5),
                    thermal: factors(1.0),
                    acidity: factors(0.25),
                    bleaching: vec![step == 1, false],
                },
                events: StepEvents {
                    recruits: step,
                    bleached: usize::from(step == 1),
                },
            });
        }
        store
    }

    #[test]
    fn summarizes_history() {
        let mut analyzer = Analyzer::new();
        analyzer.add_history(&history(&[0.1, 0.2, 0.3]));
        let results = analyzer.results();

        assert_eq!(results[0]["completed_steps"], 3);
        let cover = &results[1]["mean_cover"];
        assert_eq!(cover["n_vals"], 3);
        assert!((cover["trend"].as_f64().unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(results[2]["final_state"]["cover"][1], 0.3);
        assert_eq!(results[3]["mean_factors"]["acidity"]["mean"], 0.25);
        assert_eq!(results[4]["events"]["recruits"], 3);
        assert_eq!(results[4]["events"]["bleaching_steps"], 1);
    }

    #[test]
    fn empty_history_reports_zero_steps() {
        let analyzer = Analyzer::new();
        let results = analyzer.results();
        assert_eq!(results[0]["completed_steps"], 0);
        assert!(results[1]["mean_cover"]["mean"].is_null());
    }
}
