use super::{ProcessKind, ProcessModel, StressorFactor, aligned_records, require};
use crate::colony::ColonyState;
use crate::config::FlowParams;
use crate::environment::EnvironmentField;
use crate::error::SimError;

/// Mass-transfer enhancement by water flow, `1 - exp(-u / u_c)`.
///
/// Stagnant water limits exchange across the boundary layer; above the
/// characteristic velocity `u_c` returns diminish.
#[derive(Debug, Clone)]
pub struct FlowModel {
    params: FlowParams,
}

impl FlowModel {
    pub fn new(params: FlowParams) -> Self {
        Self { params }
    }
}

impl ProcessModel for FlowModel {
    fn kind(&self) -> ProcessKind {
        ProcessKind::Flow
    }

    fn evaluate(
        &self,
        env: &EnvironmentField,
        colony: &ColonyState,
    ) -> Result<Vec<StressorFactor>, SimError> {
        let records = aligned_records(env, colony)?;
        let mut factors = Vec::with_capacity(records.len());
        for (loc, rec) in records.iter().enumerate() {
            require(
                rec.flow_velocity.is_finite() && rec.flow_velocity >= 0.0,
                loc,
                "flow velocity",
                rec.flow_velocity,
            )?;
            require(
                rec.flow_direction.is_finite(),
                loc,
                "flow direction",
                rec.flow_direction,
            )?;

            let ratio = rec.flow_velocity / self.params.characteristic_velocity;
            factors.push(StressorFactor::new(-(-ratio).exp_m1()));
        }
        Ok(factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::tests::record;
    use crate::process::tests::{colony, field};

    fn evaluate(velocities: &[f64]) -> Result<Vec<StressorFactor>, SimError> {
        let model = FlowModel::new(FlowParams {
            characteristic_velocity: 0.2,
        });
        let records = velocities
            .iter()
            .map(|&u| {
                let mut rec = record(27.0);
                rec.flow_velocity = u;
                rec
            })
            .collect();
        model.evaluate(&field(records), &colony(velocities.len()))
    }

    #[test]
    fn stagnant_water_limits_fully() {
        assert_eq!(evaluate(&[0.0]).unwrap()[0], StressorFactor::FULL);
    }

    #[test]
    fn increases_with_diminishing_returns() {
        let factors = evaluate(&[0.1, 0.2, 0.4, 100.0]).unwrap();
        assert!(factors.windows(2).all(|pair| pair[0] < pair[1] || pair[1].value() == 1.0));
        let gain_low = factors[1].value() - factors[0].value();
        let gain_high = factors[2].value() - factors[1].value();
        assert!(gain_high < gain_low);
        assert!(factors[3].value() <= 1.0);
    }

    #[test]
    fn rejects_negative_velocity() {
        let err = evaluate(&[0.1, -0.3]).unwrap_err();
        assert_eq!(err.locations(), vec![1]);
    }
}
