//! Fixed spatial grid and the initial condition it is loaded from.

use crate::colony::{Colony, ColonyState, ThermalTolerance};
use crate::config::{ThermalParams, check_num, check_tolerance};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// A coral site. Its index in [`Grid::sites`] is its location index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub x: f64,
    pub y: f64,
}

/// Ordered, fixed-size sequence of sites for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    sites: Vec<Site>,
}

impl Grid {
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }
}

#[derive(Debug, Deserialize)]
struct SiteRecord {
    x: f64,
    y: f64,
    cover: f64,
    volume: f64,
    lower_limit: Option<f64>,
    upper_limit: Option<f64>,
    bleaching_threshold: Option<f64>,
    #[serde(default = "default_eligible")]
    recruit_eligible: bool,
}

fn default_eligible() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InitialFile {
    site: Vec<SiteRecord>,
}

/// Grid and starting coral population.
#[derive(Debug, Clone)]
pub struct InitialCondition {
    pub grid: Grid,
    pub colony: ColonyState,
}

impl InitialCondition {
    /// Load an initial condition from a TOML file of `[[site]]` records.
    ///
    /// Missing tolerance limits fall back to `defaults`.
    pub fn from_file<P: AsRef<Path>>(file: P, defaults: &ThermalParams) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents, defaults)
    }

    pub fn from_toml(contents: &str, defaults: &ThermalParams) -> Result<Self> {
        let initial: InitialFile =
            toml::from_str(contents).context("failed to deserialize initial condition")?;
        if initial.site.is_empty() {
            bail!("initial condition must contain at least one site");
        }

        let mut sites = Vec::with_capacity(initial.site.len());
        let mut colonies = Vec::with_capacity(initial.site.len());
        for (i_site, rec) in initial.site.into_iter().enumerate() {
            let (site, colony) =
                convert_record(rec, defaults).with_context(|| format!("invalid site {i_site}"))?;
            sites.push(site);
            colonies.push(colony);
        }

        Ok(Self {
            grid: Grid { sites },
            colony: ColonyState::new(colonies),
        })
    }
}

fn convert_record(rec: SiteRecord, defaults: &ThermalParams) -> Result<(Site, Colony)> {
    if !(rec.x.is_finite() && rec.y.is_finite()) {
        bail!("coordinates must be finite");
    }
    check_num(rec.cover, 0.0..=1.0).context("invalid cover")?;
    check_num(rec.volume, 0.0..f64::INFINITY).context("invalid volume")?;

    let tolerance = ThermalTolerance {
        lower: rec.lower_limit.unwrap_or(defaults.lower_limit),
        upper: rec.upper_limit.unwrap_or(defaults.upper_limit),
        bleaching_threshold: rec
            .bleaching_threshold
            .unwrap_or(defaults.bleaching_threshold),
    };
    check_tolerance(
        tolerance.lower,
        tolerance.upper,
        tolerance.bleaching_threshold,
    )
    .context("invalid thermal tolerance")?;

    let site = Site { x: rec.x, y: rec.y };
    let colony = Colony {
        cover: rec.cover,
        volume: rec.volume,
        age: 0.0,
        recruit_eligible: rec.recruit_eligible,
        tolerance,
    };
    Ok((site, colony))
}
