//! Aquifers: groundwater bodies discharging base flow, depleted by pumping.
use crate::basin::NodeID;
use crate::forecast::Forecast;
use crate::input::{deserialise_proportion, deserialise_proportion_nonzero};
use crate::units::{Dimensionless, Volume};
use anyhow::{Result, ensure};
use serde::Deserialize;

/// Parameters shared by all aquifers in a model
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AquiferParameters {
    /// Efficiency of irrigation supplied by pumping
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub irrigation_efficiency: Dimensionless,
    /// Fraction of irrigation losses which return to the aquifer
    #[serde(deserialize_with = "deserialise_proportion")]
    pub return_flow: Dimensionless,
    /// Fraction of channel losses which recharge a wadi-coupled aquifer
    #[serde(deserialize_with = "deserialise_proportion")]
    pub wadi_return_flow: Dimensionless,
    /// Months taken for pumping and recharge to reach the point of discharge
    pub transit_window: usize,
}

impl Default for AquiferParameters {
    fn default() -> Self {
        Self {
            irrigation_efficiency: Dimensionless(0.7),
            return_flow: Dimensionless(0.3),
            wadi_return_flow: Dimensionless(0.75),
            transit_window: 24,
        }
    }
}

impl AquiferParameters {
    /// Check the parameters not already checked on deserialisation
    pub fn validate(&self) -> Result<()> {
        ensure!(self.transit_window > 0, "transit_window cannot be zero");

        Ok(())
    }
}

/// A fixed-length circular buffer whose mean models a transit delay
#[derive(Debug, Clone, PartialEq)]
pub struct TransitBuffer(Vec<Volume>);

impl TransitBuffer {
    /// Create a buffer of `len` slots, each holding `initial`
    pub fn new(len: usize, initial: Volume) -> Self {
        Self(vec![initial; len])
    }

    /// The number of slots
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer has no slots
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn slot(&self, timestep: u32) -> usize {
        timestep as usize % self.0.len()
    }

    /// Overwrite the slot for this timestep
    pub fn reset(&mut self, timestep: u32, value: Volume) {
        let slot = self.slot(timestep);
        self.0[slot] = value;
    }

    /// Add to the slot for this timestep
    pub fn add(&mut self, timestep: u32, value: Volume) {
        let slot = self.slot(timestep);
        self.0[slot] += value;
    }

    /// The mean over all slots
    pub fn mean(&self) -> Volume {
        self.0.iter().copied().sum::<Volume>() / Dimensionless(self.0.len() as f64)
    }
}

/// The static description of an aquifer, as read from input
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AquiferDefinition {
    /// Unique name
    pub id: NodeID,
    /// Basin index, used in link names
    pub index: u32,
    /// Base flow discharged before pumping had any effect
    pub historical_base_flow: Volume,
    /// Net pumping the aquifer absorbs without any effect on base flow
    pub trigger: Volume,
    /// Base flow never falls below this
    pub min_base_flow: Volume,
    /// Whether the aquifer is recharged by channel losses
    #[serde(default)]
    pub wadi_coupled: bool,
}

/// An aquifer and its state for the current timestep
#[derive(Debug, Clone, PartialEq)]
pub struct Aquifer {
    /// Unique name
    pub id: NodeID,
    /// Basin index, used in link names
    pub index: u32,
    /// Base flow discharged before pumping had any effect
    pub historical_base_flow: Volume,
    /// Net pumping the aquifer absorbs without any effect on base flow
    pub trigger: Volume,
    /// Base flow never falls below this
    pub min_base_flow: Volume,
    /// Whether the aquifer is recharged by channel losses
    pub wadi_coupled: bool,
    /// Parameters shared by all aquifers
    pub parameters: AquiferParameters,
    /// The aquifer's own pumping demand, if any
    pub pumping_demand: Option<Forecast>,
    /// Recent demand on the aquifer
    pub demand_buffer: TransitBuffer,
    /// Recent recharge of the aquifer
    pub inflow_buffer: TransitBuffer,
    /// Delayed demand (mean of the demand buffer)
    pub demand: Volume,
    /// Delayed recharge (mean of the inflow buffer)
    pub inflow: Volume,
    /// Recharge this timestep
    pub inflow_total: Volume,
    /// Base flow discharged this timestep
    pub outflow: Volume,
    /// Demand the aquifer could not meet
    pub deficit: Volume,
}

impl Aquifer {
    /// Create a new [`Aquifer`], with its buffers filled with historical base flow
    pub fn new(
        definition: AquiferDefinition,
        parameters: AquiferParameters,
        pumping_demand: Option<Forecast>,
    ) -> Self {
        let window = parameters.transit_window;
        let initial = definition.historical_base_flow;
        Self {
            id: definition.id,
            index: definition.index,
            historical_base_flow: definition.historical_base_flow,
            trigger: definition.trigger,
            min_base_flow: definition.min_base_flow,
            wadi_coupled: definition.wadi_coupled,
            parameters,
            pumping_demand,
            demand_buffer: TransitBuffer::new(window, initial),
            inflow_buffer: TransitBuffer::new(window, initial),
            demand: Volume::ZERO,
            inflow: Volume::ZERO,
            inflow_total: Volume::ZERO,
            outflow: definition.historical_base_flow,
            deficit: Volume::ZERO,
        }
    }

    /// Update the aquifer's exogenous state for a new timestep.
    ///
    /// The buffer slots for this timestep start again from the aquifer's own pumping.
    pub fn refresh(&mut self, timestep: u32) -> Result<()> {
        let pumping = match &self.pumping_demand {
            Some(forecast) => {
                Volume(forecast.get(timestep)?) / self.parameters.irrigation_efficiency
            }
            None => Volume::ZERO,
        };
        self.demand_buffer.reset(timestep, pumping);
        self.inflow_buffer.reset(timestep, Volume::ZERO);
        self.inflow_total = Volume::ZERO;
        self.deficit = Volume::ZERO;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::aquifer;
    use rstest::rstest;

    #[test]
    fn test_transit_buffer() {
        let mut buffer = TransitBuffer::new(4, Volume(2.0));
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.mean(), Volume(2.0));

        buffer.reset(1, Volume(0.0));
        buffer.add(1, Volume(6.0));
        assert_eq!(buffer.mean(), Volume(3.0));

        // Timestep 5 wraps onto the same slot as timestep 1
        buffer.reset(5, Volume(2.0));
        assert_eq!(buffer.mean(), Volume(2.0));
    }

    #[rstest]
    fn test_aquifer_new(aquifer: Aquifer) {
        assert_eq!(aquifer.demand_buffer.len(), 24);
        assert_eq!(aquifer.demand_buffer.mean(), aquifer.historical_base_flow);
        assert_eq!(aquifer.inflow_buffer.mean(), aquifer.historical_base_flow);
    }

    #[rstest]
    fn test_aquifer_refresh(mut aquifer: Aquifer) {
        aquifer.pumping_demand = Some(Forecast::constant("pumping", 7.0, 12));
        aquifer.refresh(0).unwrap();

        // One slot of 24 now holds 7 / 0.7 instead of the historical base flow of 5
        let expected = (23.0 * 5.0 + 10.0) / 24.0;
        assert!(aquifer.demand_buffer.mean().approx_eq(Volume(expected)));
        assert!(aquifer.inflow_buffer.mean().approx_eq(Volume(23.0 * 5.0 / 24.0)));

        assert!(aquifer.refresh(12).is_err());
    }

    #[test]
    fn test_aquifer_parameters_validate() {
        let mut parameters = AquiferParameters::default();
        assert!(parameters.validate().is_ok());
        parameters.transit_window = 0;
        assert!(parameters.validate().is_err());
    }
}
