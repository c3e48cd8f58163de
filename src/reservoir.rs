//! Reservoirs: dams which store inflow, supply local demand and release the rest downstream.
use crate::basin::NodeID;
use crate::forecast::Forecast;
use crate::input::{deserialise_proportion, deserialise_proportion_nonzero};
use crate::units::{Dimensionless, Volume};
use crate::year::{Calendar, MONTHS_PER_YEAR};
use anyhow::{Result, ensure};
use serde::Deserialize;

/// The number of points on an area-storage curve (0% to 100% of capacity in steps of 2%)
pub const AREA_STORAGE_POINTS: usize = 51;

/// The spacing of the area-storage curve, as a fraction of capacity
const AREA_STORAGE_STEP: f64 = 0.02;

/// Parameters shared by all reservoirs in a model
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReservoirParameters {
    /// Efficiency of the domestic supply network
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub network_efficiency: Dimensionless,
    /// Efficiency of irrigation
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub irrigation_efficiency: Dimensionless,
    /// Fraction of irrigation losses which return to groundwater
    #[serde(deserialize_with = "deserialise_proportion")]
    pub return_flow: Dimensionless,
    /// Scales the crop water requirement
    pub cropping_intensity: Dimensionless,
    /// Volume of sediment deposited per unit of inflow
    #[serde(deserialize_with = "deserialise_proportion")]
    pub sediment_ratio: Dimensionless,
    /// Domestic consumption per inhabitant per month, in m³
    pub per_capita_use: f64,
    /// Fraction of capacity filled when the simulation starts, for reservoirs already in service
    #[serde(deserialize_with = "deserialise_proportion")]
    pub initial_storage_fraction: Dimensionless,
}

impl Default for ReservoirParameters {
    fn default() -> Self {
        Self {
            network_efficiency: Dimensionless(0.5),
            irrigation_efficiency: Dimensionless(0.5),
            return_flow: Dimensionless(0.3),
            cropping_intensity: Dimensionless(1.0),
            sediment_ratio: Dimensionless(0.001),
            per_capita_use: 5.0,
            initial_storage_fraction: Dimensionless(0.8),
        }
    }
}

impl ReservoirParameters {
    /// Check the parameters not already checked on deserialisation
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.cropping_intensity.is_finite() && self.cropping_intensity >= Dimensionless(0.0),
            "cropping_intensity must be a finite, non-negative number"
        );
        ensure!(
            self.per_capita_use.is_finite() && self.per_capita_use >= 0.0,
            "per_capita_use must be a finite, non-negative number"
        );

        Ok(())
    }
}

/// Whether a reservoir is in service
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Activation {
    /// Not yet built: inflow passes straight through
    NotBuilt,
    /// Storing and releasing water
    Active,
    /// Out of service: keeps what it stores but takes on no new capacity
    Decommissioned,
}

impl Activation {
    /// A numeric code for reporting
    pub fn code(self) -> f64 {
        match self {
            Activation::NotBuilt => 0.0,
            Activation::Active => 1.0,
            Activation::Decommissioned => 2.0,
        }
    }
}

/// The static description of a reservoir, as read from input
#[derive(Debug, Clone, PartialEq)]
pub struct ReservoirDefinition {
    /// Unique name
    pub id: NodeID,
    /// Basin index, used in link names
    pub index: u32,
    /// Design capacity
    pub capacity: Volume,
    /// The year the reservoir enters service
    pub service_year: u32,
    /// The year the reservoir leaves service, if ever
    pub end_year: Option<u32>,
    /// Number of people supplied by the reservoir
    pub inhabitants: f64,
    /// Surface area (km²) at each 2% of capacity
    pub area_storage: Vec<f64>,
}

/// The exogenous time series driving a reservoir
#[derive(Debug, Clone, PartialEq)]
pub struct ReservoirForecasts {
    /// Natural inflow to the reservoir's own catchment
    pub inflow: Forecast,
    /// Crop water requirement of the area irrigated from the reservoir
    pub crop_demand: Forecast,
    /// Net evaporation from the water surface, in mm
    pub net_evaporation: Forecast,
    /// Target storage, only for the regulating reservoir
    pub storage_objective: Option<Forecast>,
}

/// A reservoir and its state for the current timestep
#[derive(Debug, Clone, PartialEq)]
pub struct Reservoir {
    /// Unique name
    pub id: NodeID,
    /// Basin index, used in link names
    pub index: u32,
    /// The year the reservoir enters service
    pub service_year: u32,
    /// The year the reservoir leaves service, if ever
    pub end_year: Option<u32>,
    /// Number of people supplied by the reservoir
    pub inhabitants: f64,
    /// Surface area (km²) at each 2% of capacity
    pub area_storage: Vec<f64>,
    /// Parameters shared by all reservoirs
    pub parameters: ReservoirParameters,
    /// Exogenous time series
    pub forecasts: ReservoirForecasts,
    /// Timestep of commissioning (`None` if in service before the simulation started)
    service_timestep: Option<u32>,
    /// Timestep of decommissioning (`None` if never)
    end_timestep: Option<u32>,
    /// Whether the reservoir is in service
    pub activation: Activation,
    /// Current capacity, which shrinks as sediment accumulates
    pub capacity: Volume,
    /// Storage at the end of the timestep
    pub storage: Volume,
    /// Storage at the start of the timestep, after evaporation
    pub storage_open: Volume,
    /// Target storage for this timestep, for the regulating reservoir
    pub storage_objective: Option<Volume>,
    /// Inflow from the reservoir's own catchment
    pub inflow: Volume,
    /// Catchment inflow plus water routed from upstream
    pub inflow_total: Volume,
    /// Release downstream
    pub outflow: Volume,
    /// Evaporation from storage
    pub evaporation: Volume,
    /// Irrigation and domestic demand
    pub demand: Volume,
    /// Demand which could not be met
    pub deficit: Volume,
    /// Sediment accumulated since the reservoir entered service
    pub sediment: Volume,
    /// Water lost from channels feeding the reservoir
    pub wadi_losses: Volume,
}

impl Reservoir {
    /// Create a new [`Reservoir`] in its state at the start of the simulation.
    ///
    /// A reservoir in service before the simulation starts is already active, has lost capacity
    /// to the sediment deposited in the years before and is partly full.
    pub fn new(
        definition: ReservoirDefinition,
        parameters: ReservoirParameters,
        forecasts: ReservoirForecasts,
        calendar: &Calendar,
    ) -> Self {
        let service_timestep = calendar.commissioning_timestep(definition.service_year);
        let end_timestep = definition
            .end_year
            .map(|year| calendar.commissioning_timestep(year).unwrap_or(0));

        let mut capacity = definition.capacity;
        let mut activation = Activation::NotBuilt;
        let mut storage = Volume::ZERO;
        let mut sediment = Volume::ZERO;
        if service_timestep.is_none() {
            let years_in_service = calendar.start_year - definition.service_year;
            let annual_inflow = forecasts.inflow.mean() * MONTHS_PER_YEAR as f64;
            sediment = parameters.sediment_ratio * Volume(annual_inflow * years_in_service as f64);
            sediment = sediment.min(capacity);
            capacity -= sediment;
            activation = Activation::Active;
            storage = parameters.initial_storage_fraction * capacity;
        }

        Self {
            id: definition.id,
            index: definition.index,
            service_year: definition.service_year,
            end_year: definition.end_year,
            inhabitants: definition.inhabitants,
            area_storage: definition.area_storage,
            parameters,
            forecasts,
            service_timestep,
            end_timestep,
            activation,
            capacity,
            storage,
            storage_open: storage,
            storage_objective: None,
            inflow: Volume::ZERO,
            inflow_total: Volume::ZERO,
            outflow: Volume::ZERO,
            evaporation: Volume::ZERO,
            demand: Volume::ZERO,
            deficit: Volume::ZERO,
            sediment,
            wadi_losses: Volume::ZERO,
        }
    }

    /// Whether the reservoir is storing and releasing water
    pub fn is_active(&self) -> bool {
        self.activation == Activation::Active
    }

    /// Update the reservoir's exogenous state for a new timestep.
    ///
    /// Reads this timestep's forecasts, applies any change of service status, evaporates from
    /// storage and deposits sediment. Routing and the water balance come afterwards.
    pub fn refresh(&mut self, timestep: u32) -> Result<()> {
        self.inflow = Volume(self.forecasts.inflow.get(timestep)?);
        let crop_demand = self.forecasts.crop_demand.get(timestep)?;
        self.demand = Volume(
            crop_demand * self.parameters.cropping_intensity.value()
                / self.parameters.irrigation_efficiency.value()
                + self.inhabitants * self.parameters.per_capita_use
                    / 1e6
                    / self.parameters.network_efficiency.value(),
        );
        self.inflow_total = self.inflow;
        self.outflow = Volume::ZERO;
        self.deficit = Volume::ZERO;
        self.evaporation = Volume::ZERO;
        self.wadi_losses = Volume::ZERO;

        match self.activation {
            Activation::NotBuilt if self.service_timestep == Some(timestep) => {
                self.activation = Activation::Active;
                self.storage = Volume::ZERO;
                self.storage_open = Volume::ZERO;
                self.deposit_sediment();
            }
            Activation::NotBuilt => {
                self.storage = Volume::ZERO;
                self.storage_open = Volume::ZERO;
            }
            Activation::Active | Activation::Decommissioned => {
                let net_evaporation = self.forecasts.net_evaporation.get(timestep)?;
                self.evaporation = self.evaporation_loss(net_evaporation);
                self.storage_open = self.storage - self.evaporation;

                if self.activation == Activation::Decommissioned
                    || self.end_timestep.is_some_and(|end| timestep >= end)
                {
                    self.activation = Activation::Decommissioned;
                } else {
                    self.deposit_sediment();
                }
            }
        }

        self.storage_objective = match &self.forecasts.storage_objective {
            Some(objective) if self.activation != Activation::NotBuilt => {
                Some(Volume(objective.get(timestep)?))
            }
            _ => None,
        };

        Ok(())
    }

    /// The index into the area-storage curve for the current storage
    fn area_storage_bracket(&self) -> usize {
        (0..AREA_STORAGE_POINTS)
            .find(|&k| AREA_STORAGE_STEP * k as f64 * self.capacity.value() >= self.storage.value())
            .unwrap_or(AREA_STORAGE_POINTS - 1)
    }

    /// Evaporation from current storage, given net evaporation in mm.
    ///
    /// Negative net evaporation (rainfall on the water surface) adds water.
    fn evaporation_loss(&self, net_evaporation: f64) -> Volume {
        let area = self.area_storage[self.area_storage_bracket()];
        Volume(area * net_evaporation / 1000.0).min(self.storage)
    }

    /// Deposit sediment carried by this timestep's inflow, reducing capacity
    fn deposit_sediment(&mut self) {
        let increment = (self.parameters.sediment_ratio * self.inflow).min(self.capacity);
        self.sediment += increment;
        self.capacity -= increment;
    }
}
