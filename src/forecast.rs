//! Exogenous time series (inflows, demands, evaporation, storage objectives).
use anyhow::{Context, Result};
use std::rc::Rc;

/// A time series indexed by timestep, supplied from input data
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Which series this is, for error messages (e.g. "inflow for El Wahda")
    name: Rc<str>,
    values: Rc<[f64]>,
}

impl Forecast {
    /// Create a new [`Forecast`]
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: values.into(),
        }
    }

    /// A forecast with the same value for `len` timesteps
    pub fn constant(name: &str, value: f64, len: usize) -> Self {
        Self::new(name, vec![value; len])
    }

    /// The description of this series
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of timesteps covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The mean of all values in the series
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Get the value for the given timestep.
    ///
    /// Running past the end of the supplied data is an error: the simulation cannot proceed
    /// without input.
    pub fn get(&self, timestep: u32) -> Result<f64> {
        self.values.get(timestep as usize).copied().with_context(|| {
            format!(
                "Forecast {} exhausted at timestep {timestep} (only {} values supplied)",
                self.name,
                self.values.len()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    #[test]
    fn test_forecast_get() {
        let forecast = Forecast::new("inflow for A", vec![1.0, 2.0, 3.0]);
        assert_eq!(forecast.len(), 3);
        assert_eq!(forecast.get(2).unwrap(), 3.0);
        assert_eq!(forecast.mean(), 2.0);
        assert_error!(
            forecast.get(3),
            "Forecast inflow for A exhausted at timestep 3 (only 3 values supplied)"
        );
    }

    #[test]
    fn test_forecast_constant() {
        let forecast = Forecast::constant("demand", 0.5, 4);
        assert_eq!(forecast.len(), 4);
        assert_eq!(forecast.get(0).unwrap(), 0.5);
        assert_eq!(Forecast::new("empty", Vec::new()).mean(), 0.0);
    }
}
