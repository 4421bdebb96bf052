//! Per-timestep boundary conditions for the TOMCAT finite element model.

use crate::core::angular_response::{AngularResponse, AngularResponseError, OpticsWarning};
use crate::core::geometry::projected_sun_elevation;
use crate::core::optics::{Layer, OpticalAngleTable};
use crate::core::sky_temperature::{ground_temperature, sky_temperature};
use crate::core::units::{celsius_to_kelvin, BelowAbsoluteZeroError, WATTS_PER_KILOWATT};
use crate::external_conditions::{ExternalConditions, SolarPositionError};
use crate::input::RunConfig;
use crate::read_weather_file::WeatherSeries;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info};

pub use crate::external_conditions::SiteGeometry;

/// One row of the time series table. Temperatures are in K, irradiances and absorbed powers
/// in W/m2 and the projected elevation in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OutputRow {
    /// seconds since the first timestamp
    pub elapsed: f64,
    pub temp: f64,
    pub temp_sky: f64,
    pub temp_ground: f64,
    pub poai: f64,
    #[serde(skip_serializing)]
    pub poai_beam: f64,
    #[serde(skip_serializing)]
    pub poai_diffuse: f64,
    pub dni: f64,
    pub wind_speed: f64,
    pub elevation_projected: f64,
    pub abs_glass: f64,
    pub abs_encapsulant: f64,
    pub abs_cell: f64,
    pub current_factor: f64,
}

/// The time series table for one run, with any warnings raised while building it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputTable {
    pub rows: Vec<OutputRow>,
    pub warnings: Vec<OpticsWarning>,
}

impl InputTable {
    pub fn write_csv(&self, writer: impl Write) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Build the time series table for a weather series, an array and an optics table.
pub fn generate_input(
    series: &WeatherSeries,
    geometry: &SiteGeometry,
    optics: &OpticalAngleTable,
    config: &RunConfig,
) -> Result<InputTable, ComposeError> {
    info!(
        records = series.len(),
        array_tilt = geometry.array_tilt,
        array_azimuth = geometry.array_azimuth.angle(),
        "generating TOMCAT input"
    );

    let angular_response = AngularResponse::build(
        optics,
        &config.interpolation_config(),
        config.diffuse_model,
    )?;
    let conditions = ExternalConditions::new(series, geometry, config.refraction_correction)?;

    compose(series, geometry, &conditions, &angular_response, config)
}

/// Combine precomputed solar conditions and optical response into the time series table.
pub fn compose(
    series: &WeatherSeries,
    geometry: &SiteGeometry,
    conditions: &ExternalConditions,
    angular_response: &AngularResponse,
    config: &RunConfig,
) -> Result<InputTable, ComposeError> {
    if conditions.len() != series.len() {
        return Err(SolarPositionError::LengthMismatch {
            positions: conditions.len(),
            records: series.len(),
        }
        .into());
    }

    let array_azimuth = geometry.array_azimuth.angle().to_radians();
    let watts_per_kilowatt = WATTS_PER_KILOWATT as f64;

    let rows = series
        .iter()
        .map(|(simulation_time, record)| {
            let sun = conditions.sun_position(&simulation_time);
            let aoi = conditions.angle_of_incidence(&simulation_time);
            let beam = conditions.poai_beam(&simulation_time);
            let sky = conditions.poai_diffuse(&simulation_time);
            let poai = beam + sky;

            let incident = |layer: Layer| {
                angular_response.beam_response(layer, aoi) * beam
                    + angular_response.diffuse_coefficient(layer) * sky
            };
            let current_factor = incident(Layer::CurrentDerate) / poai;

            Ok(OutputRow {
                elapsed: simulation_time.elapsed_seconds(),
                temp: celsius_to_kelvin(record.dry_bulb).map_err(|source| {
                    ComposeError::Temperature {
                        index: simulation_time.index,
                        source,
                    }
                })?,
                temp_sky: sky_temperature(
                    record.dew_point,
                    conditions.clearness_index(&simulation_time),
                    record.dry_bulb,
                    &config.sky_temperature_coefficients,
                ),
                temp_ground: ground_temperature(
                    record.dry_bulb,
                    record.ghi,
                    &config.ground_temperature_coefficients,
                ),
                poai,
                poai_beam: beam,
                poai_diffuse: sky,
                dni: record.dni,
                wind_speed: record.wind_speed,
                elevation_projected: projected_sun_elevation(
                    sun.apparent_elevation.to_radians(),
                    sun.azimuth.to_radians(),
                    array_azimuth,
                ),
                abs_glass: incident(Layer::Glass) / watts_per_kilowatt,
                abs_encapsulant: incident(Layer::Encapsulant) / watts_per_kilowatt,
                abs_cell: incident(Layer::Cell) / watts_per_kilowatt,
                // no irradiance at night
                current_factor: if current_factor.is_finite() {
                    current_factor
                } else {
                    0.
                },
            })
        })
        .collect::<Result<Vec<_>, ComposeError>>()?;

    debug!(rows = rows.len(), "composed time series");

    Ok(InputTable {
        rows,
        warnings: angular_response.warnings().to_vec(),
    })
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    AngularResponse(#[from] AngularResponseError),
    #[error(transparent)]
    SolarPosition(#[from] SolarPositionError),
    #[error("Dry bulb temperature of record {index} is invalid: {source}")]
    Temperature {
        index: usize,
        source: BelowAbsoluteZeroError,
    },
}
