//! Fixtures for tests
use crate::aquifer::{Aquifer, AquiferDefinition, AquiferParameters};
use crate::basin::{Basin, LinkDefinition, LinkKind, Node};
use crate::forecast::Forecast;
use crate::institution::{Claimant, ClaimantConfig, Regulator, RegulatorConfig, TreatySchedule};
use crate::model::{Model, ModelParameters};
use crate::outlet::Outlet;
use crate::reservoir::{
    AREA_STORAGE_POINTS, Reservoir, ReservoirDefinition, ReservoirForecasts, ReservoirParameters,
};
use crate::units::{Dimensionless, Volume};
use crate::year::Calendar;
use rstest::fixture;
use std::path::Path;

/// The number of timesteps covered by forecasts in fixtures
const FORECAST_LEN: usize = 48;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn calendar() -> Calendar {
    Calendar::new(1983, 4).unwrap()
}

#[fixture]
pub fn reservoir_definition() -> ReservoirDefinition {
    ReservoirDefinition {
        id: "Dam".into(),
        index: 1,
        capacity: Volume(100.0),
        service_year: 1983,
        end_year: None,
        inhabitants: 0.0,
        area_storage: (0..AREA_STORAGE_POINTS).map(|k| k as f64).collect(),
    }
}

#[fixture]
pub fn reservoir_forecasts() -> ReservoirForecasts {
    ReservoirForecasts {
        inflow: Forecast::constant("inflow", 10.0, FORECAST_LEN),
        crop_demand: Forecast::constant("crop demand", 2.0, FORECAST_LEN),
        net_evaporation: Forecast::constant("net evaporation", 0.0, FORECAST_LEN),
        storage_objective: None,
    }
}

/// A reservoir commissioned in April of the start year
#[fixture]
pub fn reservoir(
    reservoir_definition: ReservoirDefinition,
    reservoir_forecasts: ReservoirForecasts,
    calendar: Calendar,
) -> Reservoir {
    Reservoir::new(
        reservoir_definition,
        ReservoirParameters::default(),
        reservoir_forecasts,
        &calendar,
    )
}

/// A reservoir which has not been built, with the given ID and basin index
pub fn reservoir_with_index(id: &str, index: u32) -> Reservoir {
    let definition = ReservoirDefinition {
        id: id.into(),
        index,
        ..reservoir_definition()
    };

    reservoir(definition, reservoir_forecasts(), calendar())
}

#[fixture]
pub fn aquifer() -> Aquifer {
    let definition = AquiferDefinition {
        id: "Aquifer".into(),
        index: 100,
        historical_base_flow: Volume(5.0),
        trigger: Volume(10.0),
        min_base_flow: Volume(1.0),
        wadi_coupled: false,
    };

    Aquifer::new(definition, AquiferParameters::default(), None)
}

/// An outlet with ID `Outlet` and basin index 0
pub fn outlet() -> Outlet {
    Outlet::new(
        "Outlet".into(),
        0,
        Forecast::constant("outlet inflow", 1.0, FORECAST_LEN),
    )
}

/// A link with a yield of 0.5 for channels and 1 for transfers. Controlled channels can carry 1.
pub fn link(kind: LinkKind, upstream: &str, downstream: &str) -> LinkDefinition {
    let (link_yield, max_flow) = match kind {
        LinkKind::Natural => (0.5, None),
        LinkKind::Controlled => (0.5, Some(Volume(1.0))),
        LinkKind::Transfer => (1.0, None),
    };

    LinkDefinition {
        kind,
        upstream: upstream.into(),
        downstream: downstream.into(),
        link_yield: Dimensionless(link_yield),
        max_flow,
    }
}

/// `Upper` flows into `Lower`, which flows into `Outlet`
#[fixture]
pub fn basin() -> Basin {
    let nodes = vec![
        Node::Reservoir(reservoir_with_index("Upper", 2)),
        Node::Reservoir(reservoir_with_index("Lower", 1)),
        Node::Outlet(outlet()),
    ];
    let links = vec![
        link(LinkKind::Natural, "Upper", "Lower"),
        link(LinkKind::Natural, "Lower", "Outlet"),
    ];

    Basin::new(nodes, links).unwrap()
}

#[fixture]
pub fn regulator_config() -> RegulatorConfig {
    toml::from_str(
        r#"
        regulating_reservoir = "Dam"
        outlet = "Outlet"
        coupled_aquifer = "Aquifer"
        "#,
    )
    .unwrap()
}

#[fixture]
pub fn regulator(regulator_config: RegulatorConfig) -> Regulator {
    Regulator::new(regulator_config, TreatySchedule::default())
}

#[fixture]
pub fn claimant() -> Claimant {
    Claimant::new(
        ClaimantConfig::default(),
        &TreatySchedule::default().concession,
    )
}

#[fixture]
pub fn model_parameters() -> ModelParameters {
    toml::from_str(
        r#"
        start_year = 1983

        [regulator]
        regulating_reservoir = "Dam"
        outlet = "Outlet"
        coupled_aquifer = "Aquifer"
        "#,
    )
    .unwrap()
}

/// `Dam` releases into `Outlet` and receives base flow from `Aquifer`
#[fixture]
pub fn treaty_basin(mut reservoir: Reservoir, aquifer: Aquifer) -> Basin {
    reservoir.forecasts.storage_objective =
        Some(Forecast::constant("storage objective", 20.0, FORECAST_LEN));
    let nodes = vec![
        Node::Reservoir(reservoir),
        Node::Aquifer(aquifer),
        Node::Outlet(outlet()),
    ];
    let links = vec![
        link(LinkKind::Natural, "Dam", "Outlet"),
        link(LinkKind::Transfer, "Aquifer", "Dam"),
    ];

    Basin::new(nodes, links).unwrap()
}

/// A model running for three years on [`treaty_basin`]
#[fixture]
pub fn model(model_parameters: ModelParameters, treaty_basin: Basin) -> Model {
    Model::new(Path::new("model"), model_parameters, treaty_basin, 36).unwrap()
}
