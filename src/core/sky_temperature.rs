//! Effective sky and ground temperatures for the radiative boundary conditions, after
//!
//! Slauch, Ian, Michael Deceglie, Timothy Silverman, and Vivian E. Ferry
//! "Spectrally-selective mirrors with combined optical and thermal benefit
//! for photovoltaic module thermal management." ACS Photonics (2018)

use crate::core::units::ZERO_CELSIUS_IN_KELVIN;
use serde::{Deserialize, Serialize};

/// Fitted coefficients of the sky temperature model
/// `a0 + a1 * ln(Pw) - a2 * clearness_index + a3 * T_ambient[K]`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SkyTemperatureCoefficients(pub [f64; 4]);

impl Default for SkyTemperatureCoefficients {
    /// coefficients fit in Golden, CO
    fn default() -> Self {
        Self([76.56, 10.59, 4.557, 0.4437])
    }
}

/// Linear correction of ambient temperature by global horizontal irradiance.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct GroundTemperatureCoefficients {
    /// in K
    pub offset: f64,
    /// in K per W/m2
    pub ghi_slope: f64,
}

impl GroundTemperatureCoefficients {
    /// The full fitted model including its night-time intercept.
    pub fn slauch_2018() -> Self {
        Self {
            offset: -1.362,
            ghi_slope: 1.287e-2,
        }
    }
}

impl Default for GroundTemperatureCoefficients {
    /// Solar heating only: with no irradiance the ground sits at ambient temperature.
    fn default() -> Self {
        Self {
            offset: 0.,
            ghi_slope: 1.287e-2,
        }
    }
}

/// Vapor pressure in Pa from the Tetens equation, for a dew point in deg C.
pub fn tetens(dew_point: f64) -> f64 {
    let (a, b) = if dew_point >= 0. {
        (17.27, 237.3)
    } else {
        // over ice
        (21.875, 265.5)
    };

    610.78 * ((a * dew_point) / (dew_point + b)).exp()
}

/// Effective sky temperature, in K.
///
/// Arguments:
/// * `dew_point` - in deg C
/// * `clearness_index` - global horizontal over extraterrestrial horizontal irradiance
/// * `ambient_temperature` - dry bulb temperature, in deg C
pub fn sky_temperature(
    dew_point: f64,
    clearness_index: f64,
    ambient_temperature: f64,
    coefficients: &SkyTemperatureCoefficients,
) -> f64 {
    let [a0, a1, a2, a3] = coefficients.0;
    let vapor_pressure = tetens(dew_point);

    a0 + a1 * vapor_pressure.ln() - a2 * clearness_index
        + a3 * (ambient_temperature + ZERO_CELSIUS_IN_KELVIN)
}

/// Effective ground temperature, in K, from ambient temperature in deg C and global
/// horizontal irradiance in W/m2.
pub fn ground_temperature(
    ambient_temperature: f64,
    ghi: f64,
    coefficients: &GroundTemperatureCoefficients,
) -> f64 {
    ambient_temperature
        + coefficients.offset
        + coefficients.ghi_slope * ghi
        + ZERO_CELSIUS_IN_KELVIN
}
