use crate::core::angular_response::{DiffuseModel, InterpolationConfig};
use crate::core::sky_temperature::{GroundTemperatureCoefficients, SkyTemperatureCoefficients};
use crate::core::units::Orientation360;
use crate::external_conditions::SiteGeometry;
use crate::read_weather_file::SiteLocation;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read};
use thiserror::Error;

pub fn ingest_run_config(json: impl Read) -> Result<RunConfig, RunConfigError> {
    let config: RunConfig = serde_json::from_reader(BufReader::new(json))?;
    config.validate()?;

    Ok(config)
}

/// Parameters of one input generation run. Every field is optional in JSON.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// degrees from horizontal, 0 to 180
    pub array_tilt: f64,
    /// degrees east of north
    pub array_azimuth: f64,
    pub diffuse_model: DiffuseModel,
    /// grid step for hemispherical averaging, in degrees
    pub interpolation_step: f64,
    pub sky_temperature_coefficients: SkyTemperatureCoefficients,
    pub ground_temperature_coefficients: GroundTemperatureCoefficients,
    pub refraction_correction: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            array_tilt: 40.,
            array_azimuth: 180.,
            diffuse_model: DiffuseModel::default(),
            interpolation_step: 1.,
            sky_temperature_coefficients: SkyTemperatureCoefficients::default(),
            ground_temperature_coefficients: GroundTemperatureCoefficients::default(),
            refraction_correction: true,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), RunConfigError> {
        if !(0. ..=180.).contains(&self.array_tilt) {
            return Err(RunConfigError::InvalidTilt(self.array_tilt));
        }
        Orientation360::new(self.array_azimuth)
            .map_err(|_| RunConfigError::InvalidAzimuth(self.array_azimuth))?;
        if !(self.interpolation_step.is_finite() && self.interpolation_step > 0.) {
            return Err(RunConfigError::InvalidInterpolationStep(
                self.interpolation_step,
            ));
        }

        Ok(())
    }

    pub fn interpolation_config(&self) -> InterpolationConfig {
        InterpolationConfig {
            step: self.interpolation_step,
            ..Default::default()
        }
    }

    pub fn site_geometry(&self, location: SiteLocation) -> Result<SiteGeometry, RunConfigError> {
        self.validate()?;

        Ok(SiteGeometry {
            location,
            array_tilt: self.array_tilt,
            array_azimuth: Orientation360::new(self.array_azimuth)
                .map_err(|_| RunConfigError::InvalidAzimuth(self.array_azimuth))?,
        })
    }
}

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("Array tilt must be between 0 and 180 degrees, got {0}")]
    InvalidTilt(f64),
    #[error("Array azimuth must be between 0 and 360 degrees, got {0}")]
    InvalidAzimuth(f64),
    #[error("Interpolation step must be positive, got {0}")]
    InvalidInterpolationStep(f64),
    #[error("Could not parse run configuration: {0}")]
    Json(#[from] serde_json::Error),
}
