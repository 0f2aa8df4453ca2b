//! Colony growth, calcification, mortality and recruitment.

use crate::colony::ColonyState;
use crate::config::{GrowthParams, RecruitmentParams};
use crate::error::SimError;
use crate::process::{Factors, ProcessKind};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};

/// How the four stressor factors are combined into one growth factor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combination {
    /// Each stressor attenuates calcification independently.
    #[default]
    Product,
    /// Only the most limiting stressor counts.
    Minimum,
}

impl Combination {
    pub fn combine(self, factors: [f64; 4]) -> f64 {
        match self {
            Combination::Product => factors.iter().product(),
            Combination::Minimum => factors.iter().copied().fold(1.0, f64::min),
        }
    }
}

/// Events of one integration step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvents {
    pub recruits: usize,
    pub bleached: usize,
}

/// Advances [`ColonyState`] by one biological step.
#[derive(Debug, Clone)]
pub struct GrowthIntegrator {
    growth: GrowthParams,
    recruitment: RecruitmentParams,
    combination: Combination,
    settle_dist: Bernoulli,
}

impl GrowthIntegrator {
    pub fn new(
        growth: GrowthParams,
        recruitment: RecruitmentParams,
        combination: Combination,
    ) -> Result<Self> {
        let settle_dist =
            Bernoulli::new(recruitment.probability).context("invalid recruitment probability")?;
        Ok(Self {
            growth,
            recruitment,
            combination,
            settle_dist,
        })
    }

    /// Integrate `colony` forward by `dt` years under `factors`.
    ///
    /// Cover grows logistically towards `max_cover` at a rate scaled by the
    /// combined factor, with the Euler step bounded so it never overshoots.
    /// Volume accretes in proportion to live cover. Background and bleaching
    /// mortality then remove live cover, and eligible low-cover locations may
    /// receive recruits drawn from `rng`.
    pub fn integrate<R: Rng>(
        &self,
        colony: &mut ColonyState,
        factors: &Factors,
        dt: f64,
        rng: &mut R,
    ) -> Result<StepEvents, SimError> {
        let lens = ProcessKind::ALL.map(|kind| factors.get(kind).len());
        for len in lens.into_iter().chain([factors.bleaching.len()]) {
            if len != colony.len() {
                return Err(SimError::GridMismatch {
                    coral: colony.len(),
                    hydro: len,
                });
            }
        }

        let GrowthParams {
            growth_rate,
            max_cover,
            calcification_rate,
            background_mortality,
            bleaching_mortality,
        } = self.growth;
        let survival = (1.0 - background_mortality * dt).clamp(0.0, 1.0);

        let mut events = StepEvents::default();
        for (loc, col) in colony.colonies_mut().iter_mut().enumerate() {
            let combined = self.combination.combine(factors.at(loc));
            let cover = col.cover;

            // Logistic growth, bounded between the current cover and the maximum.
            let delta = growth_rate * combined * cover * (1.0 - cover / max_cover) * dt;
            let (lo, hi) = if cover <= max_cover {
                (cover, max_cover)
            } else {
                (max_cover, cover)
            };
            col.cover = (cover + delta).clamp(lo, hi);
            col.volume += calcification_rate * combined * cover * dt;

            col.cover *= survival;
            col.volume *= survival;

            if factors.bleaching[loc] {
                let remaining = 1.0 - bleaching_mortality;
                col.cover *= remaining;
                col.volume *= remaining;
                events.bleached += 1;
            }

            if col.recruit_eligible
                && col.cover < self.recruitment.cover_threshold
                && self.settle_dist.sample(rng)
                && combined > 0.0
            {
                col.cover += self.recruitment.recruit_cover * combined;
                col.volume += self.recruitment.recruit_volume * combined;
                events.recruits += 1;
            }

            col.cover = col.cover.clamp(0.0, 1.0);
            col.volume = col.volume.max(0.0);
            if col.cover > 0.0 {
                col.age += dt;
            } else {
                col.age = 0.0;
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::StressorFactor;
    use crate::process::tests::colony;
    use approx::assert_relative_eq;
    use rand_chacha::ChaCha12Rng;

    fn growth() -> GrowthParams {
        GrowthParams {
            growth_rate: 0.5,
            max_cover: 0.9,
            calcification_rate: 0.02,
            background_mortality: 0.0,
            bleaching_mortality: 0.3,
        }
    }

    fn no_recruitment() -> RecruitmentParams {
        RecruitmentParams {
            cover_threshold: 0.01,
            probability: 0.0,
            recruit_cover: 0.005,
            recruit_volume: 0.0001,
        }
    }

    fn uniform_factors(n: usize, value: f64, bleaching: bool) -> Factors {
        let field = vec![StressorFactor::new(value); n];
        Factors {
            light: field.clone(),
            flow: field.clone(),
            thermal: field.clone(),
            acidity: field,
            bleaching: vec![bleaching; n],
        }
    }

    fn integrator(recruitment: RecruitmentParams) -> GrowthIntegrator {
        GrowthIntegrator::new(growth(), recruitment, Combination::Product).unwrap()
    }

    #[test]
    fn combination_strategies() {
        let factors = [0.5, 0.8, 1.0, 0.25];
        assert_relative_eq!(Combination::Product.combine(factors), 0.1);
        assert_relative_eq!(Combination::Minimum.combine(factors), 0.25);
    }

    #[test]
    fn zero_stress_approaches_maximum_monotonically() {
        let integ = integrator(no_recruitment());
        let factors = uniform_factors(1, 1.0, false);
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut col = colony(1);
        let mut prev = col.colonies()[0].cover;
        for _ in 0..200 {
            integ.integrate(&mut col, &factors, 1.0, &mut rng).unwrap();
            let cover = col.colonies()[0].cover;
            assert!(cover >= prev);
            assert!(cover <= growth().max_cover);
            prev = cover;
        }
        assert_relative_eq!(prev, growth().max_cover, max_relative = 1e-6);
    }

    #[test]
    fn single_site_scenario_grows_below_one() {
        let integ = integrator(no_recruitment());
        let factors = uniform_factors(1, 1.0, false);
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut col = colony(1);
        let mut prev = 0.1;
        for _ in 0..10 {
            integ.integrate(&mut col, &factors, 1.0, &mut rng).unwrap();
            let cover = col.colonies()[0].cover;
            assert!(cover > prev && cover <= 1.0);
            prev = cover;
        }
    }

    #[test]
    fn bounds_hold_for_random_states() {
        let recruitment = RecruitmentParams {
            cover_threshold: 0.2,
            probability: 0.5,
            recruit_cover: 0.3,
            recruit_volume: 0.01,
        };
        let mut params = growth();
        params.growth_rate = 20.0;
        params.background_mortality = 3.0;
        params.bleaching_mortality = 0.9;
        let integ = GrowthIntegrator::new(params, recruitment, Combination::Minimum).unwrap();

        let mut rng = ChaCha12Rng::seed_from_u64(5);
        for _ in 0..100 {
            let mut col = colony(6);
            for c in col.colonies_mut() {
                c.cover = rng.random_range(0.0..=1.0);
                c.volume = rng.random_range(0.0..1.0);
            }
            let mut factors = uniform_factors(6, 1.0, false);
            for loc in 0..6 {
                factors.light[loc] = StressorFactor::new(rng.random());
                factors.thermal[loc] = StressorFactor::new(rng.random());
                factors.bleaching[loc] = rng.random_bool(0.5);
            }
            let dt = rng.random_range(0.01..2.0);
            integ.integrate(&mut col, &factors, dt, &mut rng).unwrap();
            for c in col.colonies() {
                assert!((0.0..=1.0).contains(&c.cover));
                assert!(c.volume >= 0.0);
            }
        }
    }

    #[test]
    fn bare_substrate_stays_bare_without_recruits() {
        let integ = integrator(no_recruitment());
        let factors = uniform_factors(1, 1.0, false);
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mut col = colony(1);
        col.colonies_mut()[0].cover = 0.0;
        col.colonies_mut()[0].volume = 0.0;
        for _ in 0..20 {
            integ.integrate(&mut col, &factors, 1.0, &mut rng).unwrap();
        }
        assert_eq!(col.colonies()[0].cover, 0.0);
        assert_eq!(col.colonies()[0].age, 0.0);
    }

    #[test]
    fn bleaching_reduces_cover_against_control() {
        let integ = integrator(no_recruitment());
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let mut control = colony(1);
        let mut stressed = colony(1);
        integ
            .integrate(&mut control, &uniform_factors(1, 1.0, false), 1.0, &mut rng)
            .unwrap();
        let events = integ
            .integrate(&mut stressed, &uniform_factors(1, 1.0, true), 1.0, &mut rng)
            .unwrap();
        assert_eq!(events.bleached, 1);
        assert!(stressed.colonies()[0].cover < control.colonies()[0].cover);
    }

    #[test]
    fn recruitment_is_reproducible_for_a_seed() {
        let recruitment = RecruitmentParams {
            cover_threshold: 0.01,
            probability: 0.3,
            recruit_cover: 0.005,
            recruit_volume: 0.0001,
        };
        let integ = integrator(recruitment);
        let factors = uniform_factors(50, 1.0, false);

        let run = |seed| {
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let mut col = colony(50);
            for c in col.colonies_mut() {
                c.cover = 0.0;
            }
            let events = integ.integrate(&mut col, &factors, 1.0, &mut rng).unwrap();
            (events, col)
        };

        let (events_a, col_a) = run(9);
        let (events_b, col_b) = run(9);
        assert_eq!(events_a, events_b);
        assert_eq!(col_a, col_b);
        assert!(events_a.recruits > 0 && events_a.recruits < 50);
        for c in col_a.colonies().iter().filter(|c| c.cover > 0.0) {
            assert_relative_eq!(c.cover, 0.005);
        }
    }

    #[test]
    fn ineligible_substrate_gets_no_recruits() {
        let recruitment = RecruitmentParams {
            cover_threshold: 0.5,
            probability: 1.0,
            recruit_cover: 0.01,
            recruit_volume: 0.0,
        };
        let integ = integrator(recruitment);
        let mut col = colony(2);
        for c in col.colonies_mut() {
            c.cover = 0.0;
        }
        col.colonies_mut()[1].recruit_eligible = false;
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let events = integ
            .integrate(&mut col, &uniform_factors(2, 1.0, false), 1.0, &mut rng)
            .unwrap();
        assert_eq!(events.recruits, 1);
        assert_eq!(col.colonies()[1].cover, 0.0);
    }

    #[test]
    fn rejects_short_factor_vectors() {
        let integ = integrator(no_recruitment());
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        for kind in ProcessKind::ALL {
            let mut factors = uniform_factors(3, 1.0, false);
            match kind {
                ProcessKind::Light => factors.light.pop(),
                ProcessKind::Flow => factors.flow.pop(),
                ProcessKind::Thermal => factors.thermal.pop(),
                ProcessKind::Acidity => factors.acidity.pop(),
            };
            let mut col = colony(3);
            let err = integ.integrate(&mut col, &factors, 1.0, &mut rng).unwrap_err();
            assert_eq!(err, SimError::GridMismatch { coral: 3, hydro: 2 }, "{kind:?}");
            assert_eq!(col, colony(3));
        }
    }
}
