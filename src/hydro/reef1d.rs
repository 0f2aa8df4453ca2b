use super::{CouplingInterface, check_len};
use crate::config::DAYS_PER_YEAR;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const GRAV_ACC: f64 = 9.81;
/// Depth-limited breaking index `H_max / h`.
const BREAKER_INDEX: f64 = 0.78;
const MAX_ITER: usize = 100;
const REL_TOL: f64 = 1e-12;

/// Settings of [`Reef1D`], read from `[hydro.settings]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reef1DSettings {
    /// Still-water depth per cell (m); non-positive cells are dry.
    pub bathymetry: Vec<f64>,
    /// Cross-shore cell spacing (m).
    #[serde(default = "default_dx")]
    pub dx: f64,
    /// Significant wave height (m).
    pub wave_height: f64,
    /// Peak wave period (s).
    pub wave_period: f64,
    /// Depth-averaged current over bare substrate (m/s).
    #[serde(default)]
    pub current_velocity: f64,
    /// Current direction (rad).
    #[serde(default)]
    pub flow_direction: f64,
    /// Water level relative to still water (m).
    #[serde(default)]
    pub water_level: f64,
    /// Roughness of bare substrate (m).
    #[serde(default = "default_roughness")]
    pub base_roughness: f64,
    pub temperature: TemperatureRegime,
}

impl Reef1DSettings {
    /// Distance of each cell from the offshore boundary (m).
    fn cell_positions(&self) -> Vec<f64> {
        (0..self.bathymetry.len())
            .map(|i_cell| i_cell as f64 * self.dx)
            .collect()
    }
}

fn default_dx() -> f64 {
    10.0
}

fn default_roughness() -> f64 {
    0.05
}

/// Seasonal water temperature with a linear warming trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRegime {
    /// Annual mean (°C).
    pub mean: f64,
    /// Seasonal amplitude (°C).
    #[serde(default)]
    pub amplitude: f64,
    /// Seasonal period (days).
    #[serde(default = "default_period")]
    pub period_days: f64,
    /// Warming trend (°C per year).
    #[serde(default)]
    pub warming_per_year: f64,
}

fn default_period() -> f64 {
    DAYS_PER_YEAR
}

impl TemperatureRegime {
    fn at(&self, time_days: f64) -> f64 {
        self.mean
            + self.amplitude * (2.0 * PI * time_days / self.period_days).sin()
            + self.warming_per_year * time_days / DAYS_PER_YEAR
    }
}

/// Simplified one-dimensional hydrodynamic model of a cross-shore reef
/// transect, for order-of-magnitude flow conditions.
///
/// Waves follow linear theory: the wave length solves the dispersion
/// relation `L = g T² / 2π · tanh(2π h / L)`, wave height is depth limited,
/// and the near-bed orbital velocity is `π H / (T sinh(k h))`. The current
/// slows as the bed roughens, `u = U √(z₀ / z)`. The reported flow velocity
/// is the root-sum-square of both.
#[derive(Debug, Default)]
pub struct Reef1D {
    settings: Option<Reef1DSettings>,
    time: f64,
    roughness: Vec<f64>,
    coral_cover: Vec<f64>,
    depth: Vec<f64>,
    wave_length: Vec<f64>,
    group_celerity: Vec<f64>,
    velocity: Vec<f64>,
}

impl Reef1D {
    fn settings(&self) -> Result<&Reef1DSettings> {
        self.settings.as_ref().context("solver is not initialized")
    }

    /// Human-readable summary of the configured transect.
    pub fn describe(&self) -> String {
        let Some(s) = &self.settings else {
            return "Reef1D (not initialized)".into();
        };
        let (min, max) = s
            .bathymetry
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            });
        format!(
            "one-dimensional reef transect: {} cells over {} m, depth {min}-{max} m, \
             Hs = {} m, Tp = {} s, current = {} m/s",
            s.bathymetry.len(),
            s.bathymetry.len() as f64 * s.dx,
            s.wave_height,
            s.wave_period,
            s.current_velocity
        )
    }

    fn compute_fields(&mut self) -> Result<()> {
        let s = self.settings()?.clone();
        let n_cells = s.bathymetry.len();
        self.depth.clear();
        self.wave_length.clear();
        self.group_celerity.clear();
        self.velocity.clear();

        for i_cell in 0..n_cells {
            let depth = s.bathymetry[i_cell] + s.water_level;
            let current = s.current_velocity * (s.base_roughness / self.roughness[i_cell]).sqrt();

            let (wave_length, group_celerity, orbital) = if depth > 0.0 {
                let wave_length = solve_wave_length(s.wave_period, depth)
                    .with_context(|| format!("wave length diverged in cell {i_cell}"))?;
                let k = 2.0 * PI / wave_length;
                let kh = k * depth;
                let celerity = wave_length / s.wave_period;
                let n = 0.5 * (1.0 + 2.0 * kh / (2.0 * kh).sinh());
                let height = s.wave_height.min(BREAKER_INDEX * depth);
                let orbital = PI * height / (s.wave_period * kh.sinh());
                (wave_length, n * celerity, orbital)
            } else {
                (0.0, 0.0, 0.0)
            };

            let velocity = if depth > 0.0 {
                orbital.hypot(current)
            } else {
                0.0
            };
            if !velocity.is_finite() {
                bail!("flow velocity diverged in cell {i_cell}");
            }

            self.depth.push(depth.max(0.0));
            self.wave_length.push(wave_length);
            self.group_celerity.push(group_celerity);
            self.velocity.push(velocity);
        }
        Ok(())
    }
}

/// Solve the linear dispersion relation for the wave length (m) by Newton
/// iteration from the deep-water wave length.
pub fn solve_wave_length(period: f64, depth: f64) -> Result<f64> {
    let deep = GRAV_ACC * period * period / (2.0 * PI);
    let a = 2.0 * PI * depth;
    let mut len = deep;
    for _ in 0..MAX_ITER {
        let tanh = (a / len).tanh();
        let func = len - deep * tanh;
        let sech2 = 1.0 - tanh * tanh;
        let deriv = 1.0 + deep * a * sech2 / (len * len);
        let next = len - func / deriv;
        if !next.is_finite() || next <= 0.0 {
            bail!("dispersion relation diverged (T = {period} s, h = {depth} m)");
        }
        if (next - len).abs() <= REL_TOL * next {
            return Ok(next);
        }
        len = next;
    }
    bail!("dispersion relation did not converge (T = {period} s, h = {depth} m)")
}

impl CouplingInterface for Reef1D {
    fn name(&self) -> &str {
        "reef1d"
    }

    fn initialize(&mut self, settings: &toml::Table) -> Result<()> {
        let settings: Reef1DSettings = toml::Value::Table(settings.clone())
            .try_into()
            .context("failed to deserialize reef1d settings")?;
        if settings.bathymetry.is_empty() {
            bail!("bathymetry must not be empty");
        }
        if settings.bathymetry.iter().any(|h| !h.is_finite()) {
            bail!("bathymetry must be finite");
        }
        if !(settings.wave_period > 0.0 && settings.dx > 0.0 && settings.base_roughness > 0.0) {
            bail!("wave period, cell spacing and base roughness must be positive");
        }
        if !(settings.wave_height >= 0.0 && settings.current_velocity >= 0.0) {
            bail!("wave height and current velocity must not be negative");
        }
        if !(settings.temperature.period_days > 0.0) {
            bail!("temperature period must be positive");
        }

        let n_cells = settings.bathymetry.len();
        self.roughness = vec![settings.base_roughness; n_cells];
        self.coral_cover = vec![0.0; n_cells];
        self.time = 0.0;
        self.settings = Some(settings);
        self.compute_fields()?;
        log::info!("{}", self.describe());
        Ok(())
    }

    fn update(&mut self, dt: f64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            bail!("time step must be positive, but is {dt}");
        }
        self.time += dt;
        self.compute_fields()
    }

    fn get_value(&self, name: &str) -> Result<Vec<f64>> {
        let s = self.settings()?;
        let n_cells = s.bathymetry.len();
        let values = match name {
            "water_depth" => self.depth.clone(),
            "flow_velocity" => self.velocity.clone(),
            "flow_direction" => vec![s.flow_direction; n_cells],
            "water_temperature" => vec![s.temperature.at(self.time); n_cells],
            "wave_length" => self.wave_length.clone(),
            "group_celerity" => self.group_celerity.clone(),
            "bed_roughness" => self.roughness.clone(),
            "coral_cover" => self.coral_cover.clone(),
            "x_coordinate" => s.cell_positions(),
            _ => bail!("unknown variable {name:?}"),
        };
        Ok(values)
    }

    fn set_value(&mut self, name: &str, values: &[f64]) -> Result<()> {
        let n_cells = self.get_grid_size();
        check_len(name, values, n_cells)?;
        match name {
            "bed_roughness" => {
                if values.iter().any(|&z| !(z.is_finite() && z > 0.0)) {
                    bail!("bed roughness must be positive");
                }
                self.roughness = values.to_vec();
                self.compute_fields()
            }
            "coral_cover" => {
                self.coral_cover = values.to_vec();
                Ok(())
            }
            _ => bail!("variable {name:?} is read-only or unknown"),
        }
    }

    fn get_current_time(&self) -> f64 {
        self.time
    }

    fn get_grid_size(&self) -> usize {
        self.settings.as_ref().map_or(0, |s| s.bathymetry.len())
    }

    fn get_x_coordinate(&self) -> Option<Vec<f64>> {
        self.settings.as_ref().map(Reef1DSettings::cell_positions)
    }

    fn finalize(&mut self) -> Result<()> {
        log::debug!("finalized reef1d at t = {} d", self.time);
        self.settings = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings_table() -> toml::Table {
        toml::from_str(
            r#"
bathymetry = [ 8.0, 4.0, 2.0, 0.0,]
dx = 25.0
wave_height = 1.5
wave_period = 8.0
current_velocity = 0.2
water_level = 0.5

[temperature]
mean = 27.0
amplitude = 1.5
warming_per_year = 0.1
"#,
        )
        .unwrap()
    }

    fn solver() -> Reef1D {
        let mut solver = Reef1D::default();
        solver.initialize(&settings_table()).unwrap();
        solver
    }

    #[test]
    fn dispersion_limits() {
        let period = 10.0;
        let deep = GRAV_ACC * period * period / (2.0 * PI);
        assert_relative_eq!(solve_wave_length(period, 1000.0).unwrap(), deep, max_relative = 1e-9);

        let shallow = solve_wave_length(period, 0.5).unwrap();
        let expected = period * (GRAV_ACC * 0.5).sqrt();
        assert_relative_eq!(shallow, expected, max_relative = 0.01);
    }

    #[test]
    fn dispersion_is_satisfied() {
        for depth in [0.3, 2.0, 7.5, 40.0] {
            let period = 6.0;
            let len = solve_wave_length(period, depth).unwrap();
            let rhs = GRAV_ACC * period * period / (2.0 * PI) * (2.0 * PI * depth / len).tanh();
            assert_relative_eq!(len, rhs, max_relative = 1e-9);
        }
    }

    #[test]
    fn exposes_fields_per_cell() {
        let solver = solver();
        assert_eq!(solver.get_grid_size(), 4);
        let depth = solver.get_value("water_depth").unwrap();
        assert_eq!(depth, vec![8.5, 4.5, 2.5, 0.5]);
        let velocity = solver.get_value("flow_velocity").unwrap();
        assert!(velocity.iter().all(|&u| u.is_finite() && u >= 0.2));
        assert!(velocity[2] > velocity[0]);
        let cg = solver.get_value("group_celerity").unwrap();
        assert!(cg[0] > cg[2]);
        assert!(solver.get_value("salinity").is_err());
    }

    #[test]
    fn dry_cells_have_no_waves_or_flow() {
        let mut table = settings_table();
        table.insert(
            "bathymetry".into(),
            toml::Value::Array(vec![toml::Value::Float(5.0), toml::Value::Float(-1.0)]),
        );
        table.insert("water_level".into(), toml::Value::Float(0.0));
        let mut solver = Reef1D::default();
        solver.initialize(&table).unwrap();
        solver.update(1.0).unwrap();

        assert_eq!(solver.get_value("water_depth").unwrap(), vec![5.0, 0.0]);
        let wave_length = solver.get_value("wave_length").unwrap();
        assert!(wave_length[0] > 0.0);
        assert_eq!(wave_length[1], 0.0);
        let velocity = solver.get_value("flow_velocity").unwrap();
        assert!(velocity[0] > 0.0);
        assert_eq!(velocity[1], 0.0);
        assert_eq!(solver.get_value("group_celerity").unwrap()[1], 0.0);
    }

    #[test]
    fn reports_cell_positions() {
        let solver = solver();
        let expected = vec![0.0, 25.0, 50.0, 75.0];
        assert_eq!(solver.get_x_coordinate(), Some(expected.clone()));
        assert_eq!(solver.get_value("x_coordinate").unwrap(), expected);
        assert_eq!(Reef1D::default().get_x_coordinate(), None);
    }

    #[test]
    fn temperature_follows_regime() {
        let mut solver = solver();
        solver.update(DAYS_PER_YEAR / 4.0).unwrap();
        let temp = solver.get_value("water_temperature").unwrap();
        assert_relative_eq!(temp[0], 27.0 + 1.5 + 0.025, max_relative = 1e-9);
        assert_relative_eq!(solver.get_current_time(), DAYS_PER_YEAR / 4.0);
    }

    #[test]
    fn roughness_slows_current() {
        let mut solver = solver();
        let before = solver.get_value("flow_velocity").unwrap();
        solver.set_value("bed_roughness", &[0.5; 4]).unwrap();
        let after = solver.get_value("flow_velocity").unwrap();
        assert!(after.iter().zip(&before).all(|(a, b)| a < b));
        assert!(solver.set_value("bed_roughness", &[0.5; 3]).is_err());
        assert!(solver.set_value("water_depth", &[1.0; 4]).is_err());
    }

    #[test]
    fn rejects_invalid_settings() {
        let mut table = settings_table();
        table.insert("wave_period".into(), toml::Value::Float(0.0));
        assert!(Reef1D::default().initialize(&table).is_err());

        let mut solver = solver();
        assert!(solver.update(-1.0).is_err());
    }
}
