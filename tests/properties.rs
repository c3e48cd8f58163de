//! Checks that the water balance holds throughout a run of the example model.
use float_cmp::approx_eq;
use tempfile::tempdir;
use yarmouk::basin::Node;
use yarmouk::history::{Attribute, History};
use yarmouk::input::load_model;
use yarmouk::model::Model;
use yarmouk::simulation;

const TOLERANCE: f64 = 1e-9;

fn load() -> Model {
    load_model("demos/yarmouk").unwrap()
}

fn run(model: Model) -> History {
    let dir = tempdir().unwrap();
    simulation::run(model, dir.path(), false).unwrap()
}

fn series<'a>(history: &'a History, entity: &str, attribute: Attribute) -> &'a [f64] {
    history
        .get(entity, attribute)
        .unwrap_or_else(|| panic!("No {attribute} recorded for {entity}"))
}

#[test]
fn test_history_covers_run() {
    let model = load();
    let num_timesteps = model.num_timesteps;
    let history = run(model);
    assert_eq!(history.num_timesteps(), num_timesteps);
    assert_eq!(series(&history, "Adasiya", Attribute::QuotaShare).len(), 48);
}

#[test]
fn test_reservoir_mass_conservation() {
    let model = load();
    let basin = &model.basin;
    let regulating = model.treaty_nodes.regulating_reservoir;

    // Reservoirs whose deficits are not relieved by pumping from an aquifer
    let reservoirs: Vec<String> = basin
        .iter_upstream_to_downstream()
        .filter(|&index| index != regulating)
        .filter(|&index| matches!(basin.node(index), Node::Reservoir(_)))
        .filter(|&index| {
            basin
                .downstream(index)
                .all(|down| !matches!(basin.node(down), Node::Aquifer(_)))
        })
        .map(|index| basin.node(index).id().to_string())
        .collect();
    assert!(!reservoirs.is_empty());

    let history = run(model);
    for id in &reservoirs {
        let activation = series(&history, id, Attribute::Activation);
        let storage = series(&history, id, Attribute::Storage);
        let storage_open = series(&history, id, Attribute::StorageOpen);
        let inflow_total = series(&history, id, Attribute::InflowTotal);
        let outflow = series(&history, id, Attribute::Outflow);
        let demand = series(&history, id, Attribute::Demand);
        let deficit = series(&history, id, Attribute::Deficit);

        for t in 0..activation.len() {
            if activation[t] == 0.0 {
                continue;
            }

            let demand_met = demand[t] - deficit[t];
            assert!(
                approx_eq!(
                    f64,
                    storage[t] + outflow[t] + demand_met,
                    storage_open[t] + inflow_total[t],
                    epsilon = TOLERANCE
                ),
                "Water balance of {id} does not close in timestep {t}"
            );
        }
    }
}

#[test]
fn test_invariants_hold_every_timestep() {
    let model = load();
    let mut reservoirs = Vec::new();
    let mut aquifers = Vec::new();
    for node in model.basin.iter_nodes() {
        match node {
            Node::Reservoir(reservoir) => reservoirs.push(reservoir.id.to_string()),
            Node::Aquifer(aquifer) => {
                aquifers.push((aquifer.id.to_string(), aquifer.min_base_flow.value()));
            }
            Node::Outlet(_) => {}
        }
    }
    let history = run(model);

    for id in &reservoirs {
        // Capacity only ever falls, as sediment builds up
        let capacity = series(&history, id, Attribute::Capacity);
        assert!(
            capacity.windows(2).all(|pair| pair[1] <= pair[0]),
            "Capacity of {id} increased"
        );

        let storage = series(&history, id, Attribute::Storage);
        for (t, (&storage, &capacity)) in storage.iter().zip(capacity).enumerate() {
            assert!(storage >= 0.0, "Negative storage in {id} in timestep {t}");
            assert!(
                storage <= capacity + TOLERANCE,
                "Storage of {id} exceeds capacity in timestep {t}"
            );
        }

        for attribute in [Attribute::Deficit, Attribute::Outflow] {
            assert!(
                series(&history, id, attribute)
                    .iter()
                    .all(|&value| value >= -TOLERANCE),
                "Negative {attribute} in {id}"
            );
        }
    }

    for (id, min_base_flow) in &aquifers {
        assert!(
            series(&history, id, Attribute::Outflow)
                .iter()
                .all(|&value| value >= min_base_flow - TOLERANCE),
            "Base flow of {id} below its minimum"
        );
        assert!(
            series(&history, id, Attribute::Deficit)
                .iter()
                .all(|&value| value >= -TOLERANCE),
            "Negative deficit in {id}"
        );
    }
}

#[test]
fn test_outlet_split_is_complete() {
    let history = run(load());
    let inflow_total = series(&history, "Adasiya", Attribute::InflowTotal);
    let quota_share = series(&history, "Adasiya", Attribute::QuotaShare);
    let remainder_share = series(&history, "Adasiya", Attribute::RemainderShare);

    for t in 0..inflow_total.len() {
        assert!(quota_share[t] >= 0.0);
        assert!(remainder_share[t] >= 0.0);
        assert!(
            approx_eq!(
                f64,
                quota_share[t] + remainder_share[t],
                inflow_total[t],
                epsilon = TOLERANCE
            ),
            "Outlet flow unaccounted for in timestep {t}"
        );
    }
}

#[test]
fn test_regulating_reservoir_enters_service() {
    let history = run(load());

    // El Wahda is commissioned in April 2006, the 28th month of the run
    let activation = series(&history, "El Wahda", Attribute::Activation);
    assert!(activation[..27].iter().all(|&code| code == 0.0));
    assert!(activation[27..].iter().all(|&code| code == 1.0));

    // Daraa East leaves service in April 2005
    let activation = series(&history, "Daraa East", Attribute::Activation);
    assert_eq!(activation[14], 1.0);
    assert_eq!(activation[15], 2.0);

    // The claimant never withdraws more than its pumping capacity
    assert!(
        series(&history, "claimant", Attribute::Withdrawal)
            .iter()
            .all(|&value| (0.0..=10.24 + TOLERANCE).contains(&value))
    );
}
