use crate::growth::Combination;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Days per year used to convert hydrodynamic time to biological time.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    pub forcing: ForcingConfig,
    pub light: LightParams,
    pub flow: FlowParams,
    pub thermal: ThermalParams,
    pub acidity: AcidityParams,
    pub growth: GrowthParams,
    pub recruitment: RecruitmentParams,
    pub hydro: HydroConfig,
}

/// Run horizon and clock settings.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of biological steps to simulate.
    pub n_bio_steps: usize,
    /// Number of hydrodynamic steps per biological step.
    pub hydro_steps_per_bio: usize,
    /// Length of one hydrodynamic step in days.
    pub hydro_dt_days: f64,
    /// Seed of the recruitment random stream.
    pub seed: u64,
    /// Push coral cover back to the solver (two-way coupling).
    #[serde(default)]
    pub feedback: bool,
    /// How the four stressor factors are combined.
    #[serde(default)]
    pub combination: Combination,
}

impl RunConfig {
    /// Length of one biological step in years.
    pub fn bio_dt_years(&self) -> f64 {
        self.hydro_steps_per_bio as f64 * self.hydro_dt_days / DAYS_PER_YEAR
    }
}

/// Forcing the hydrodynamic solver does not provide.
///
/// Both series are cycled once per biological step.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ForcingConfig {
    /// Surface irradiance (µmol photons m⁻² s⁻¹).
    pub surface_irradiance: Vec<f64>,
    /// Aragonite saturation state (dimensionless).
    pub aragonite: Vec<f64>,
}

impl ForcingConfig {
    pub fn surface_irradiance_at(&self, bio_step: usize) -> f64 {
        self.surface_irradiance[bio_step % self.surface_irradiance.len()]
    }

    pub fn aragonite_at(&self, bio_step: usize) -> f64 {
        self.aragonite[bio_step % self.aragonite.len()]
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct LightParams {
    /// Light extinction coefficient (m⁻¹).
    pub extinction_coefficient: f64,
    /// Irradiance at which photosynthesis saturates.
    pub saturation_irradiance: f64,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct FlowParams {
    /// Velocity above which mass transfer gains little (m/s).
    pub characteristic_velocity: f64,
}

/// Thermal tolerance defaults, overridable per site.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct ThermalParams {
    /// Lower edge of the tolerance band (°C).
    pub lower_limit: f64,
    /// Upper edge of the tolerance band (°C).
    pub upper_limit: f64,
    /// Hard threshold above which exceedance is counted (°C).
    pub bleaching_threshold: f64,
    /// Temperature scale of the degradation outside the band (°C).
    pub degradation_width: f64,
    /// Consecutive biological steps above the hard threshold that trigger bleaching.
    pub exceedance_steps: usize,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct AcidityParams {
    /// Saturation state below which calcification stops.
    pub omega_0: f64,
    /// Half-saturation constant of the calcification response.
    pub kappa: f64,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct GrowthParams {
    /// Intrinsic cover growth rate (yr⁻¹).
    pub growth_rate: f64,
    /// Cover the population approaches without stress.
    pub max_cover: f64,
    /// Volume added per unit live cover at zero stress (m³ yr⁻¹).
    pub calcification_rate: f64,
    /// Background mortality rate (yr⁻¹).
    pub background_mortality: f64,
    /// Fraction of live cover lost per biological step while bleaching.
    pub bleaching_mortality: f64,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct RecruitmentParams {
    /// Locations below this cover may receive recruits.
    pub cover_threshold: f64,
    /// Establishment probability per biological step at zero stress.
    pub probability: f64,
    /// Cover added by a successful recruitment.
    pub recruit_cover: f64,
    /// Volume added by a successful recruitment (m³).
    pub recruit_volume: f64,
}

/// Hydrodynamic solver selection and exchange settings.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HydroConfig {
    /// Solver name, see [`crate::hydro::build_solver`].
    pub solver: String,
    /// Solver-owned settings passed to `initialize`.
    #[serde(default)]
    pub settings: toml::Table,
    #[serde(default)]
    pub variables: VariableNames,
    #[serde(default)]
    pub roughness: RoughnessParams,
}

/// Names of the variables exchanged with the solver.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableNames {
    pub flow_velocity: String,
    pub flow_direction: String,
    pub water_temperature: String,
    pub water_depth: String,
    pub coral_cover: String,
    pub bed_roughness: String,
}

impl Default for VariableNames {
    fn default() -> Self {
        Self {
            flow_velocity: "flow_velocity".into(),
            flow_direction: "flow_direction".into(),
            water_temperature: "water_temperature".into(),
            water_depth: "water_depth".into(),
            coral_cover: "coral_cover".into(),
            bed_roughness: "bed_roughness".into(),
        }
    }
}

/// Bed roughness derived from coral cover for two-way coupling.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RoughnessParams {
    /// Roughness of bare substrate (m).
    pub base: f64,
    /// Roughness added per unit cover and unit colony height (dimensionless).
    pub coefficient: f64,
}

impl Default for RoughnessParams {
    fn default() -> Self {
        Self {
            base: 0.05,
            coefficient: 0.5,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let run = &self.run;
        check_num(run.n_bio_steps, 1..1_000_000).context("invalid number of biological steps")?;
        check_num(run.hydro_steps_per_bio, 1..1_000_000)
            .context("invalid number of hydrodynamic steps per biological step")?;
        check_pos(run.hydro_dt_days).context("invalid hydrodynamic step length")?;

        check_series(&self.forcing.surface_irradiance, 0.0..)
            .context("invalid surface irradiance series")?;
        check_series(&self.forcing.aragonite, f64::MIN_POSITIVE..)
            .context("invalid aragonite series")?;

        check_num(self.light.extinction_coefficient, 0.0..10.0)
            .context("invalid extinction coefficient")?;
        check_pos(self.light.saturation_irradiance).context("invalid saturation irradiance")?;

        check_pos(self.flow.characteristic_velocity).context("invalid characteristic velocity")?;

        let thermal = &self.thermal;
        check_tolerance(
            thermal.lower_limit,
            thermal.upper_limit,
            thermal.bleaching_threshold,
        )
        .context("invalid thermal tolerance defaults")?;
        check_pos(thermal.degradation_width).context("invalid degradation width")?;
        check_num(thermal.exceedance_steps, 1..10_000).context("invalid exceedance duration")?;

        check_num(self.acidity.omega_0, 0.0..10.0).context("invalid omega_0")?;
        check_pos(self.acidity.kappa).context("invalid kappa")?;

        let growth = &self.growth;
        check_num(growth.growth_rate, 0.0..100.0).context("invalid growth rate")?;
        check_num(growth.max_cover, f64::MIN_POSITIVE..=1.0).context("invalid maximum cover")?;
        check_num(growth.calcification_rate, 0.0..100.0).context("invalid calcification rate")?;
        check_num(growth.background_mortality, 0.0..100.0)
            .context("invalid background mortality")?;
        check_num(growth.bleaching_mortality, 0.0..=1.0).context("invalid bleaching mortality")?;

        let recruitment = &self.recruitment;
        check_num(recruitment.cover_threshold, 0.0..=1.0)
            .context("invalid recruitment cover threshold")?;
        check_num(recruitment.probability, 0.0..=1.0).context("invalid recruitment probability")?;
        check_num(recruitment.recruit_cover, 0.0..=1.0).context("invalid recruit cover")?;
        check_num(recruitment.recruit_volume, 0.0..100.0).context("invalid recruit volume")?;

        check_pos(self.hydro.roughness.base).context("invalid base roughness")?;
        check_num(self.hydro.roughness.coefficient, 0.0..100.0)
            .context("invalid roughness coefficient")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

pub fn check_pos(num: f64) -> Result<()> {
    if !(num.is_finite() && num > 0.0) {
        bail!("number must be positive and finite, but is {num:?}");
    }
    Ok(())
}

pub fn check_tolerance(lower: f64, upper: f64, threshold: f64) -> Result<()> {
    if !(lower.is_finite() && upper.is_finite() && threshold.is_finite()) {
        bail!("tolerance limits must be finite");
    }
    if lower >= upper {
        bail!("lower limit {lower} must be below upper limit {upper}");
    }
    if threshold < upper {
        bail!("bleaching threshold {threshold} must not be below upper limit {upper}");
    }
    Ok(())
}

fn check_series<R>(series: &[f64], range: R) -> Result<()>
where
    R: RangeBounds<f64> + Debug + Clone,
{
    if series.is_empty() {
        bail!("series must not be empty");
    }
    for (i_val, &val) in series.iter().enumerate() {
        check_num(val, range.clone()).with_context(|| format!("invalid element {i_val}"))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const CONFIG_TOML: &str = r#"
[run]
n_bio_steps = 10
hydro_steps_per_bio = 4
hydro_dt_days = 91.3125
seed = 7

[forcing]
surface_irradiance = [ 1500.0,]
aragonite = [ 3.5,]

[light]
extinction_coefficient = 0.1
saturation_irradiance = 372.32

[flow]
characteristic_velocity = 0.17

[thermal]
lower_limit = 22.0
upper_limit = 29.0
bleaching_threshold = 30.0
degradation_width = 2.0
exceedance_steps = 2

[acidity]
omega_0 = 0.14587
kappa = 0.66236

[growth]
growth_rate = 0.5
max_cover = 0.9
calcification_rate = 0.02
background_mortality = 0.0
bleaching_mortality = 0.3

[recruitment]
cover_threshold = 0.01
probability = 0.2
recruit_cover = 0.005
recruit_volume = 0.0001

[hydro]
solver = "prescribed"

[hydro.settings]
water_depth = [ 5.0,]
flow_velocity = [ 0.3,]
flow_direction = [ 0.0,]
water_temperature = [ 27.0,]
"#;

    pub fn test_config() -> Config {
        toml::from_str(CONFIG_TOML).expect("failed to parse test config")
    }

    #[test]
    fn parses_and_validates_example() {
        let config = test_config();
        config.validate().expect("example config should be valid");
        assert_eq!(config.run.combination, Combination::Product);
        assert!(!config.run.feedback);
        assert_eq!(config.hydro.variables, VariableNames::default());
        approx::assert_relative_eq!(config.run.bio_dt_years(), 1.0);
    }

    #[test]
    fn rejects_inverted_tolerance_band() {
        let mut config = test_config();
        config.thermal.lower_limit = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_aragonite() {
        let mut config = test_config();
        config.forcing.aragonite = vec![3.0, 0.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_forcing() {
        let mut config = test_config();
        config.forcing.surface_irradiance.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn forcing_series_cycle_per_step() {
        let forcing = ForcingConfig {
            surface_irradiance: vec![1.0, 2.0, 3.0],
            aragonite: vec![4.0],
        };
        assert_eq!(forcing.surface_irradiance_at(4), 2.0);
        assert_eq!(forcing.aragonite_at(9), 4.0);
    }
}
