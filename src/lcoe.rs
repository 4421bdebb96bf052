//! Levelized cost of energy by discounted cash flow, a clone of the NREL PV LCOE calculator
//! at <https://pvlcoe.nrel.gov>.

use crate::core::solvers::root;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, PartialEq, Serialize)]
pub enum SystemType {
    #[default]
    #[serde(rename = "fixed tilt, utility scale")]
    #[strum(serialize = "fixed tilt, utility scale")]
    FixedTiltUtilityScale,
    #[serde(rename = "single-axis tracked, utility scale")]
    #[strum(serialize = "single-axis tracked, utility scale")]
    SingleAxisTrackedUtilityScale,
    #[serde(rename = "roof-mounted, residential scale")]
    #[strum(serialize = "roof-mounted, residential scale")]
    RoofMountedResidentialScale,
}

impl SystemType {
    pub fn parse(system_type: &str) -> Result<Self, LcoeError> {
        Self::from_str(system_type)
            .map_err(|_| LcoeError::UnknownSystemType(system_type.to_string()))
    }
}

/// Inputs to the calculator. The defaults match the web version as of 2018-09-24.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct LcoeInputs {
    /// in USD/m2
    pub cost_module: f64,
    /// in USD/kW/year
    pub cost_om: f64,
    /// in %/year
    pub r_degradation: f64,
    /// in %
    pub r_discount: f64,
    /// in h, i.e. kWh per kW installed per year
    pub energy_yield: f64,
    /// in years
    pub service_life: u32,
    /// US state code selecting balance of system costs
    pub state: String,
    /// module efficiency, in %
    pub efficiency: f64,
    pub system_type: SystemType,
}

impl Default for LcoeInputs {
    fn default() -> Self {
        Self {
            cost_module: 1.15 * 58.78,
            cost_om: 15.40,
            r_degradation: 0.36,
            r_discount: 6.3,
            energy_yield: 1475.,
            service_life: 25,
            state: "MO".into(),
            efficiency: 19.,
            system_type: SystemType::default(),
        }
    }
}

/// Balance of system costs for one system type and state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BosCosts {
    /// in USD/W
    pub cost_bos_power: f64,
    /// in USD/m2
    pub cost_bos_area: f64,
}

/// Nested `system type -> state -> costs` lookup as published at
/// <https://www.nrel.gov/pv/lcoe-calculator/js/bos_cost_tree.js>.
#[derive(Clone, Debug, PartialEq)]
pub struct BosCostTree(Value);

impl BosCostTree {
    pub fn new(tree: Value) -> Self {
        Self(tree)
    }

    /// Parse the published JavaScript source, which assigns the tree as a JSON literal.
    pub fn from_js(source: &str) -> Result<Self, LcoeError> {
        let json = source.rsplit('=').next().unwrap_or_default();
        Ok(Self(serde_json::from_str(json.trim().trim_end_matches(';'))?))
    }

    pub fn costs(&self, system_type: SystemType, state: &str) -> Result<BosCosts, LcoeError> {
        let by_state = self
            .0
            .get(system_type.to_string())
            .ok_or(LcoeError::MissingSystemType(system_type))?;
        let costs = by_state
            .get(state)
            .ok_or_else(|| LcoeError::UnknownState(state.to_string()))?;
        let cost = |field: &'static str| {
            costs
                .get(field)
                .and_then(Value::as_f64)
                .ok_or_else(|| LcoeError::MissingCost {
                    state: state.to_string(),
                    field,
                })
        };

        Ok(BosCosts {
            cost_bos_power: cost("cost_bos_power")?,
            cost_bos_area: cost("cost_bos_area")?,
        })
    }
}

/// LCOE in USD/kWh.
pub fn lcoe(inputs: &LcoeInputs, bos_cost_tree: &BosCostTree) -> Result<f64, LcoeError> {
    validate(inputs)?;
    let bos = bos_cost_tree.costs(inputs.system_type, &inputs.state)?;

    Ok(levelized_cost(inputs, bos))
}

fn validate(inputs: &LcoeInputs) -> Result<(), LcoeError> {
    if !(inputs.efficiency > 0.) {
        return Err(LcoeError::InvalidInput("efficiency must be positive"));
    }
    if inputs.service_life == 0 {
        return Err(LcoeError::InvalidInput("service life must be at least one year"));
    }
    if !(inputs.energy_yield > 0.) {
        return Err(LcoeError::InvalidInput("energy yield must be positive"));
    }
    if inputs.r_discount <= -100. {
        return Err(LcoeError::InvalidInput("discount rate must exceed -100%"));
    }

    Ok(())
}

fn levelized_cost(inputs: &LcoeInputs, bos: BosCosts) -> f64 {
    let cost = |year: u32| {
        if year == 0 {
            inputs.cost_module / (10. * inputs.efficiency)
                + bos.cost_bos_power
                + bos.cost_bos_area / (10. * inputs.efficiency)
        } else {
            inputs.cost_om / 1000.
        }
    };
    let energy = |year: u32| {
        if year == 0 {
            0.
        } else {
            (inputs.energy_yield / 1000.
                * (1. - inputs.r_degradation / 100.).powi(year as i32 - 1))
            .max(0.)
        }
    };
    let discount = |year: u32| (1. + inputs.r_discount / 100.).powi(year as i32);

    let (total_cost, total_energy) =
        (0..=inputs.service_life).fold((0., 0.), |(total_cost, total_energy), year| {
            (
                total_cost + cost(year) / discount(year),
                total_energy + energy(year) / discount(year),
            )
        });

    total_cost / total_energy
}

/// Extra module cost, in USD/m2, that a module producing `energy_factor` times the energy
/// could carry while matching the LCOE of the baseline `inputs`.
pub fn breakeven_module_cost(
    inputs: &LcoeInputs,
    bos_cost_tree: &BosCostTree,
    energy_factor: f64,
) -> Result<f64, LcoeError> {
    if !(energy_factor > 0.) {
        return Err(LcoeError::InvalidInput("energy factor must be positive"));
    }
    validate(inputs)?;
    let bos = bos_cost_tree.costs(inputs.system_type, &inputs.state)?;
    let baseline = levelized_cost(inputs, bos);

    let lcoe_difference = |cost_extra: f64| {
        let proposed = LcoeInputs {
            cost_module: inputs.cost_module + cost_extra,
            energy_yield: inputs.energy_yield * energy_factor,
            ..inputs.clone()
        };
        levelized_cost(&proposed, bos) - baseline
    };

    let breakeven = root(lcoe_difference, 0., 10., Some(1e-10))?;
    debug!(baseline, breakeven, energy_factor, "solved breakeven module cost");

    Ok(breakeven)
}

#[derive(Debug, Error)]
pub enum LcoeError {
    #[error("Unknown system type '{0}'")]
    UnknownSystemType(String),
    #[error("BOS cost tree has no entry for system type '{0}'")]
    MissingSystemType(SystemType),
    #[error("BOS cost tree has no entry for state '{0}'")]
    UnknownState(String),
    #[error("BOS cost tree entry for state '{state}' has no numeric '{field}'")]
    MissingCost { state: String, field: &'static str },
    #[error("Invalid LCOE input: {0}")]
    InvalidInput(&'static str),
    #[error("Could not parse BOS cost tree: {0}")]
    InvalidCostTree(#[from] serde_json::Error),
    #[error(transparent)]
    Solver(#[from] anyhow::Error),
}
