use super::{CouplingInterface, check_len};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Settings of [`Prescribed`], read from `[hydro.settings]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescribedSettings {
    /// Water depth per cell (m).
    pub water_depth: Vec<f64>,
    /// Flow velocity per cell (m/s).
    pub flow_velocity: Vec<f64>,
    /// Flow direction per cell (rad).
    pub flow_direction: Vec<f64>,
    /// Domain-wide temperature series (°C), one value per update, cycled.
    pub water_temperature: Vec<f64>,
    /// Per-cell offset added to the temperature series (°C).
    #[serde(default)]
    pub temperature_offset: Option<Vec<f64>>,
    /// Cross-shore position per cell (m).
    #[serde(default)]
    pub x_coordinate: Option<Vec<f64>>,
}

/// Solver that replays prescribed fields, for controlled experiments.
#[derive(Debug, Default)]
pub struct Prescribed {
    settings: Option<PrescribedSettings>,
    time: f64,
    n_updates: usize,
    coral_cover: Vec<f64>,
    bed_roughness: Vec<f64>,
}

impl Prescribed {
    fn settings(&self) -> Result<&PrescribedSettings> {
        self.settings.as_ref().context("solver is not initialized")
    }
}

impl CouplingInterface for Prescribed {
    fn name(&self) -> &str {
        "prescribed"
    }

    fn initialize(&mut self, settings: &toml::Table) -> Result<()> {
        let settings: PrescribedSettings = toml::Value::Table(settings.clone())
            .try_into()
            .context("failed to deserialize prescribed settings")?;
        let n_cells = settings.water_depth.len();
        if n_cells == 0 {
            bail!("water_depth must not be empty");
        }
        check_len("flow_velocity", &settings.flow_velocity, n_cells)?;
        check_len("flow_direction", &settings.flow_direction, n_cells)?;
        if let Some(offset) = &settings.temperature_offset {
            check_len("temperature_offset", offset, n_cells)?;
        }
        if let Some(xs) = &settings.x_coordinate {
            check_len("x_coordinate", xs, n_cells)?;
        }
        if settings.water_temperature.is_empty() {
            bail!("water_temperature must not be empty");
        }

        self.time = 0.0;
        self.n_updates = 0;
        self.coral_cover = vec![0.0; n_cells];
        self.bed_roughness = vec![0.0; n_cells];
        self.settings = Some(settings);
        Ok(())
    }

    fn update(&mut self, dt: f64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            bail!("time step must be positive, but is {dt}");
        }
        self.time += dt;
        self.n_updates += 1;
        Ok(())
    }

    fn get_value(&self, name: &str) -> Result<Vec<f64>> {
        let s = self.settings()?;
        let values = match name {
            "water_depth" => s.water_depth.clone(),
            "flow_velocity" => s.flow_velocity.clone(),
            "flow_direction" => s.flow_direction.clone(),
            "water_temperature" => {
                let series = &s.water_temperature;
                let temp = series[self.n_updates % series.len()];
                match &s.temperature_offset {
                    Some(offset) => offset.iter().map(|off| temp + off).collect(),
                    None => vec![temp; s.water_depth.len()],
                }
            }
            "coral_cover" => self.coral_cover.clone(),
            "bed_roughness" => self.bed_roughness.clone(),
            _ => bail!("unknown variable {name:?}"),
        };
        Ok(values)
    }

    fn set_value(&mut self, name: &str, values: &[f64]) -> Result<()> {
        check_len(name, values, self.get_grid_size())?;
        match name {
            "coral_cover" => self.coral_cover = values.to_vec(),
            "bed_roughness" => self.bed_roughness = values.to_vec(),
            _ => bail!("variable {name:?} is read-only or unknown"),
        }
        Ok(())
    }

    fn get_current_time(&self) -> f64 {
        self.time
    }

    fn get_grid_size(&self) -> usize {
        self.settings.as_ref().map_or(0, |s| s.water_depth.len())
    }

    fn get_x_coordinate(&self) -> Option<Vec<f64>> {
        self.settings.as_ref()?.x_coordinate.clone()
    }

    fn finalize(&mut self) -> Result<()> {
        self.settings = None;
        Ok(())
    }
}
