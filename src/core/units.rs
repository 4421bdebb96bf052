use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

pub const WATTS_PER_KILOWATT: u32 = 1_000;
pub const SECONDS_PER_HOUR: u32 = 3_600;
pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_YEAR: u32 = 365;
pub const HOURS_PER_YEAR: u32 = HOURS_PER_DAY * DAYS_PER_YEAR;

pub(crate) const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

pub(crate) fn celsius_to_kelvin(temp_c: f64) -> Result<f64, BelowAbsoluteZeroError> {
    if temp_c < -ZERO_CELSIUS_IN_KELVIN {
        Err(BelowAbsoluteZeroError::from_c(temp_c))
    } else {
        Ok(temp_c + ZERO_CELSIUS_IN_KELVIN)
    }
}

#[derive(Debug, Error)]
#[error("A temperature of {k}ºK/{}ºC was encountered, which is less than absolute zero", k - 273.15)]
pub struct BelowAbsoluteZeroError {
    k: f64,
}

impl BelowAbsoluteZeroError {
    fn from_c(c: f64) -> Self {
        Self {
            k: c + ZERO_CELSIUS_IN_KELVIN,
        }
    }
}

/// A compass bearing in degrees east of north, 0 to 360 inclusive. Used for array azimuths.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Orientation360(f64);

impl Orientation360 {
    pub fn new(angle: f64) -> Result<Self, Orientation360Error> {
        if !(0. ..=360.).contains(&angle) {
            return Err(Orientation360Error::InvalidAngle);
        }

        Ok(Self(angle))
    }

    pub fn angle(&self) -> f64 {
        self.0
    }
}

impl Display for Orientation360 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Orientation360 {
    type Error = Orientation360Error;

    fn try_from(angle: f64) -> Result<Self, Self::Error> {
        Self::new(angle)
    }
}

impl From<Orientation360> for f64 {
    fn from(orientation: Orientation360) -> Self {
        orientation.0
    }
}

impl FromStr for Orientation360 {
    type Err = Orientation360Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let angle = s
            .parse::<f64>()
            .map_err(|_| Orientation360Error::InvalidAngle)?;
        Self::new(angle)
    }
}

#[derive(Clone, Copy, Debug, Error)]
pub enum Orientation360Error {
    #[error("Angle must be between 0 and 360 degrees inclusive")]
    InvalidAngle,
}
