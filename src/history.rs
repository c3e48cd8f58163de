//! Per-timestep records of every tracked attribute of every node and party.
use crate::aquifer::Aquifer;
use crate::basin::Node;
use crate::institution::{BasinOperator, Claimant, Regulator};
use crate::outlet::Outlet;
use crate::reservoir::Reservoir;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A quantity recorded for a node or party
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Service status of a reservoir (0 not built, 1 active, 2 decommissioned)
    Activation,
    /// Current capacity of a reservoir
    Capacity,
    /// Storage at the end of the timestep
    Storage,
    /// Storage at the start of the timestep after evaporation
    StorageOpen,
    /// Catchment inflow (delayed recharge for aquifers)
    Inflow,
    /// Total inflow including routed water (recharge this timestep for aquifers)
    InflowTotal,
    /// Release downstream
    Outflow,
    /// Evaporation from storage
    Evaporation,
    /// Demand on the node
    Demand,
    /// Demand which could not be met
    Deficit,
    /// Accumulated sediment
    Sediment,
    /// Channel losses
    WadiLosses,
    /// The outlet flow counted against the joint quota
    QuotaShare,
    /// The rest of the outlet flow
    RemainderShare,
    /// Water drawn from the regulating reservoir at the outlet
    Drawdown,
    /// The part of the guaranteed share which could not be delivered
    GuaranteedShortfall,
    /// The joint annual quota
    AnnualQuota,
    /// The joint quota targeted this month
    QuotaTarget,
    /// Water credited to the joint quota this month
    QuotaDelivered,
    /// Water pumped by the claimant
    Withdrawal,
    /// Remainder share the claimant could not pump
    PumpingLoss,
    /// Withdrawal counted against the allocation
    QuantityAvailable,
    /// Concession taken this month
    ConcessionUsed,
    /// Credit returned to the joint quota this month
    ConcessionCredit,
}

/// Something with attributes recorded every timestep
pub trait Tracked {
    /// The name under which attributes are recorded
    fn entity(&self) -> &str;

    /// The current value of every tracked attribute
    fn tracked_attributes(&self) -> Vec<(Attribute, f64)>;
}

impl Tracked for Reservoir {
    fn entity(&self) -> &str {
        &self.id.0
    }

    fn tracked_attributes(&self) -> Vec<(Attribute, f64)> {
        vec![
            (Attribute::Activation, self.activation.code()),
            (Attribute::Capacity, self.capacity.value()),
            (Attribute::Storage, self.storage.value()),
            (Attribute::StorageOpen, self.storage_open.value()),
            (Attribute::Inflow, self.inflow.value()),
            (Attribute::InflowTotal, self.inflow_total.value()),
            (Attribute::Outflow, self.outflow.value()),
            (Attribute::Evaporation, self.evaporation.value()),
            (Attribute::Demand, self.demand.value()),
            (Attribute::Deficit, self.deficit.value()),
            (Attribute::Sediment, self.sediment.value()),
            (Attribute::WadiLosses, self.wadi_losses.value()),
        ]
    }
}

impl Tracked for Aquifer {
    fn entity(&self) -> &str {
        &self.id.0
    }

    fn tracked_attributes(&self) -> Vec<(Attribute, f64)> {
        vec![
            (Attribute::Inflow, self.inflow.value()),
            (Attribute::InflowTotal, self.inflow_total.value()),
            (Attribute::Outflow, self.outflow.value()),
            (Attribute::Demand, self.demand.value()),
            (Attribute::Deficit, self.deficit.value()),
        ]
    }
}

impl Tracked for Outlet {
    fn entity(&self) -> &str {
        &self.id.0
    }

    fn tracked_attributes(&self) -> Vec<(Attribute, f64)> {
        vec![
            (Attribute::Inflow, self.inflow.value()),
            (Attribute::InflowTotal, self.inflow_total.value()),
            (Attribute::QuotaShare, self.quota_share.value()),
            (Attribute::RemainderShare, self.remainder_share.value()),
            (Attribute::Drawdown, self.drawdown.value()),
            (
                Attribute::GuaranteedShortfall,
                self.guaranteed_shortfall.value(),
            ),
        ]
    }
}

impl Tracked for Node {
    fn entity(&self) -> &str {
        match self {
            Node::Reservoir(reservoir) => reservoir.entity(),
            Node::Aquifer(aquifer) => aquifer.entity(),
            Node::Outlet(outlet) => outlet.entity(),
        }
    }

    fn tracked_attributes(&self) -> Vec<(Attribute, f64)> {
        match self {
            Node::Reservoir(reservoir) => reservoir.tracked_attributes(),
            Node::Aquifer(aquifer) => aquifer.tracked_attributes(),
            Node::Outlet(outlet) => outlet.tracked_attributes(),
        }
    }
}

impl Tracked for BasinOperator {
    fn entity(&self) -> &str {
        Self::NAME
    }

    fn tracked_attributes(&self) -> Vec<(Attribute, f64)> {
        vec![(Attribute::WadiLosses, self.wadi_losses.value())]
    }
}

impl Tracked for Regulator {
    fn entity(&self) -> &str {
        Self::NAME
    }

    fn tracked_attributes(&self) -> Vec<(Attribute, f64)> {
        vec![
            (Attribute::AnnualQuota, self.annual_quota.value()),
            (Attribute::QuotaTarget, self.quota_target.value()),
            (Attribute::QuotaDelivered, self.quota_delivered.value()),
        ]
    }
}

impl Tracked for Claimant {
    fn entity(&self) -> &str {
        Self::NAME
    }

    fn tracked_attributes(&self) -> Vec<(Attribute, f64)> {
        vec![
            (Attribute::Withdrawal, self.withdrawal.value()),
            (Attribute::PumpingLoss, self.pumping_loss.value()),
            (Attribute::QuantityAvailable, self.quantity_available.value()),
            (Attribute::ConcessionUsed, self.concession_used.value()),
            (Attribute::ConcessionCredit, self.concession_credit.value()),
        ]
    }
}

/// The recorded history of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    num_timesteps: u32,
    series: IndexMap<(Rc<str>, Attribute), Vec<f64>>,
}

impl History {
    /// The number of timesteps recorded
    pub fn num_timesteps(&self) -> u32 {
        self.num_timesteps
    }

    /// Record the state of every entity at the end of a timestep.
    ///
    /// Timesteps must be recorded in order, starting from zero.
    pub fn record<'a, I>(&mut self, timestep: u32, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a dyn Tracked>,
    {
        ensure!(
            timestep == self.num_timesteps,
            "Timestep {timestep} recorded out of order (expected {})",
            self.num_timesteps
        );

        for entity in entities {
            for (attribute, value) in entity.tracked_attributes() {
                let values = self
                    .series
                    .entry((Rc::from(entity.entity()), attribute))
                    .or_default();
                ensure!(
                    values.len() == timestep as usize,
                    "{attribute} of {} recorded twice in timestep {timestep}",
                    entity.entity()
                );
                values.push(value);
            }
        }
        self.num_timesteps += 1;

        Ok(())
    }

    /// Get the recorded values of an attribute of an entity
    pub fn get(&self, entity: &str, attribute: Attribute) -> Option<&[f64]> {
        self.series
            .get(&(Rc::from(entity), attribute))
            .map(Vec::as_slice)
    }

    /// Iterate over every recorded series
    pub fn iter(&self) -> impl Iterator<Item = (&str, Attribute, &[f64])> {
        self.series
            .iter()
            .map(|((entity, attribute), values)| (&**entity, *attribute, values.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, regulator};
    use crate::units::Volume;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_attribute_names() {
        assert_eq!(Attribute::InflowTotal.to_string(), "inflow_total");
        assert_eq!(
            Attribute::from_str("guaranteed_shortfall").unwrap(),
            Attribute::GuaranteedShortfall
        );
    }

    #[rstest]
    fn test_history_record(mut regulator: Regulator) {
        let mut history = History::default();
        history.record(0, [&regulator as &dyn Tracked]).unwrap();
        regulator.annual_quota = Volume(60.0);
        history.record(1, [&regulator as &dyn Tracked]).unwrap();

        assert_eq!(history.num_timesteps(), 2);
        assert_eq!(
            history.get("regulator", Attribute::AnnualQuota).unwrap(),
            [0.0, 60.0]
        );
        assert!(history.get("regulator", Attribute::Storage).is_none());
        assert_eq!(history.iter().count(), 3);
    }

    #[rstest]
    fn test_history_out_of_order(regulator: Regulator) {
        let mut history = History::default();
        assert_error!(
            history.record(1, [&regulator as &dyn Tracked]),
            "Timestep 1 recorded out of order (expected 0)"
        );
    }

    #[rstest]
    fn test_history_recorded_twice(regulator: Regulator) {
        let mut history = History::default();
        assert_error!(
            history.record(0, [&regulator as &dyn Tracked, &regulator as &dyn Tracked]),
            "annual_quota of regulator recorded twice in timestep 0"
        );
    }
}
