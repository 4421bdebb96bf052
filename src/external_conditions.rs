use crate::compare_floats::clip;
use crate::core::geometry::{angle_of_incidence, isotropic_sky_diffuse};
use crate::core::units::Orientation360;
use crate::read_weather_file::{SiteLocation, WeatherSeries};
use crate::simulation_time::SimulationTimeIteration;
use serde::{Deserialize, Serialize};
use solar_positioning::{spa, RefractionCorrection};
use thiserror::Error;
use tracing::debug;

/// Difference between terrestrial and universal time assumed for the solar position
/// algorithm, in seconds.
const DELTA_T: f64 = 67.;

/// Site and fixed array orientation for one run.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SiteGeometry {
    pub location: SiteLocation,
    /// degrees from horizontal
    pub array_tilt: f64,
    /// degrees east of north
    pub array_azimuth: Orientation360,
}

/// Apparent position of the sun, in degrees, azimuth east of north.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SunPosition {
    pub apparent_zenith: f64,
    pub apparent_elevation: f64,
    pub azimuth: f64,
}

impl SunPosition {
    pub fn new(apparent_zenith: f64, azimuth: f64) -> Self {
        Self {
            apparent_zenith,
            apparent_elevation: 90. - apparent_zenith,
            azimuth,
        }
    }
}

/// Sun positions for every record of a weather series, evaluated halfway through the interval
/// preceding each timestamp. With `refraction_correction`, atmospheric refraction is
/// corrected for using the mean station pressure and dry bulb temperature of the series.
pub fn sun_positions(
    series: &WeatherSeries,
    location: &SiteLocation,
    refraction_correction: bool,
) -> Result<Vec<SunPosition>, SolarPositionError> {
    let refraction = if refraction_correction {
        match (series.mean_pressure(), series.mean_dry_bulb()) {
            (Some(pressure), Some(temperature)) => Some(
                RefractionCorrection::new(pressure, temperature).map_err(|e| {
                    SolarPositionError::Refraction {
                        pressure,
                        temperature,
                        reason: e.to_string(),
                    }
                })?,
            ),
            _ => None,
        }
    } else {
        None
    };
    debug!(
        refraction_correction = refraction.is_some(),
        "computing sun positions"
    );

    series
        .simulation_time()
        .iter()
        .map(|simulation_time| {
            let midpoint = simulation_time.interval_midpoint();
            let position = spa::solar_position(
                midpoint,
                location.latitude,
                location.longitude,
                location.elevation,
                DELTA_T,
                refraction,
            )
            .map_err(|e| SolarPositionError::Spa {
                index: simulation_time.index,
                reason: e.to_string(),
            })?;

            Ok(SunPosition {
                apparent_zenith: position.zenith_angle(),
                apparent_elevation: position.elevation_angle(),
                azimuth: position.azimuth(),
            })
        })
        .collect()
}

/// Clearness index, with 1 substituted where it is undefined (e.g. at night, when the
/// extraterrestrial irradiance is zero).
pub fn clearness_index(ghi: f64, etr: f64) -> f64 {
    let clearness_index = ghi / etr;
    if clearness_index.is_finite() {
        clearness_index
    } else {
        1.
    }
}

/// Solar quantities derived from a weather series for a fixed array, one entry per record.
#[derive(Clone, Debug)]
pub struct ExternalConditions {
    sun_positions: Vec<SunPosition>,
    angles_of_incidence: Vec<f64>,
    poai_beam: Vec<f64>,
    poai_diffuse: Vec<f64>,
    clearness_indices: Vec<f64>,
}

impl ExternalConditions {
    pub fn new(
        series: &WeatherSeries,
        geometry: &SiteGeometry,
        refraction_correction: bool,
    ) -> Result<Self, SolarPositionError> {
        let sun_positions = sun_positions(series, &geometry.location, refraction_correction)?;
        Self::from_sun_positions(series, geometry, sun_positions)
    }

    /// Derive conditions from precomputed sun positions, which must be aligned with the
    /// records of `series`.
    pub fn from_sun_positions(
        series: &WeatherSeries,
        geometry: &SiteGeometry,
        sun_positions: Vec<SunPosition>,
    ) -> Result<Self, SolarPositionError> {
        if sun_positions.len() != series.len() {
            return Err(SolarPositionError::LengthMismatch {
                positions: sun_positions.len(),
                records: series.len(),
            });
        }

        let array_azimuth = geometry.array_azimuth.angle();
        let angles_of_incidence = sun_positions
            .iter()
            .map(|sun| {
                angle_of_incidence(
                    geometry.array_tilt,
                    array_azimuth,
                    sun.apparent_zenith,
                    sun.azimuth,
                )
            })
            .collect::<Vec<_>>();

        // sun behind the array or below the horizon gives no beam irradiance; a missing (NaN)
        // DNI stays NaN
        let poai_beam = series
            .records()
            .iter()
            .zip(&angles_of_incidence)
            .map(|(record, aoi)| clip(record.dni * aoi.to_radians().cos(), 0., f64::INFINITY))
            .collect();
        let poai_diffuse = series
            .records()
            .iter()
            .map(|record| isotropic_sky_diffuse(geometry.array_tilt, record.dhi))
            .collect();
        let clearness_indices = series
            .records()
            .iter()
            .map(|record| clearness_index(record.ghi, record.etr))
            .collect();

        Ok(Self {
            sun_positions,
            angles_of_incidence,
            poai_beam,
            poai_diffuse,
            clearness_indices,
        })
    }

    /// Number of timesteps covered.
    pub fn len(&self) -> usize {
        self.sun_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sun_positions.is_empty()
    }

    pub fn sun_position(&self, simulation_time: &SimulationTimeIteration) -> &SunPosition {
        &self.sun_positions[simulation_time.index]
    }

    /// in degrees
    pub fn angle_of_incidence(&self, simulation_time: &SimulationTimeIteration) -> f64 {
        self.angles_of_incidence[simulation_time.index]
    }

    /// Beam irradiance in the array plane, in W/m2
    pub fn poai_beam(&self, simulation_time: &SimulationTimeIteration) -> f64 {
        self.poai_beam[simulation_time.index]
    }

    /// Isotropic sky diffuse irradiance in the array plane, in W/m2
    pub fn poai_diffuse(&self, simulation_time: &SimulationTimeIteration) -> f64 {
        self.poai_diffuse[simulation_time.index]
    }

    pub fn poai(&self, simulation_time: &SimulationTimeIteration) -> f64 {
        self.poai_beam(simulation_time) + self.poai_diffuse(simulation_time)
    }

    pub fn clearness_index(&self, simulation_time: &SimulationTimeIteration) -> f64 {
        self.clearness_indices[simulation_time.index]
    }
}

#[derive(Debug, Error)]
pub enum SolarPositionError {
    #[error("Cannot correct for refraction at {pressure} mbar and {temperature} deg C: {reason}")]
    Refraction {
        pressure: f64,
        temperature: f64,
        reason: String,
    },
    #[error("Solar position calculation failed for record {index}: {reason}")]
    Spa { index: usize, reason: String },
    #[error("Got {positions} sun positions for {records} weather records")]
    LengthMismatch { positions: usize, records: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_weather_file::WeatherRecord;
    use crate::simulation_time::SimulationTime;
    use approx::assert_relative_eq;
    use chrono::{TimeDelta, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn golden() -> SiteLocation {
        SiteLocation {
            latitude: 39.742,
            longitude: -105.179,
            elevation: 1829.,
            utc_offset: -7.,
        }
    }

    #[fixture]
    fn geometry(golden: SiteLocation) -> SiteGeometry {
        SiteGeometry {
            location: golden,
            array_tilt: 40.,
            array_azimuth: Orientation360::new(180.).unwrap(),
        }
    }

    fn record(dni: f64, dhi: f64, ghi: f64, etr: f64) -> WeatherRecord {
        WeatherRecord {
            dry_bulb: 20.,
            dew_point: 5.,
            wind_speed: 2.,
            dni,
            ghi,
            dhi,
            etr,
            pressure: 820.,
        }
    }

    /// Hourly records from the interval ending 19:30 UTC on the summer solstice.
    fn series(records: Vec<WeatherRecord>) -> WeatherSeries {
        let simulation_time = SimulationTime::new(
            Utc.with_ymd_and_hms(2017, 6, 21, 19, 30, 0).unwrap(),
            TimeDelta::hours(1),
            records.len(),
        )
        .unwrap();
        WeatherSeries::new(simulation_time, records).unwrap()
    }

    #[rstest]
    #[case(500., 1000., 0.5)]
    #[case(0., 0., 1.)]
    #[case(10., 0., 1.)]
    fn test_clearness_index(#[case] ghi: f64, #[case] etr: f64, #[case] expected: f64) {
        assert_eq!(clearness_index(ghi, etr), expected);
    }

    #[rstest]
    fn test_sun_positions_near_solar_noon(golden: SiteLocation) {
        // the interval ending 19:30 UTC is centred on 19:00 UTC, close to solar noon
        let series = series(vec![record(800., 100., 500., 1000.)]);

        for refraction_correction in [true, false] {
            let positions = sun_positions(&series, &golden, refraction_correction).unwrap();
            let sun = positions[0];

            // noon elevation on the solstice is 90 - (latitude - 23.44)
            assert_relative_eq!(sun.apparent_elevation, 73.7, epsilon = 1.);
            assert_relative_eq!(
                sun.apparent_zenith + sun.apparent_elevation,
                90.,
                epsilon = 1e-6
            );
            assert!(sun.azimuth > 150. && sun.azimuth < 210., "got {}", sun.azimuth);
        }
    }

    #[rstest]
    fn test_conditions_at_normal_incidence(geometry: SiteGeometry) {
        let series = series(vec![record(800., 100., 500., 1000.)]);
        let conditions = ExternalConditions::from_sun_positions(
            &series,
            &geometry,
            vec![SunPosition::new(40., 180.)],
        )
        .unwrap();
        let simulation_time = series.simulation_time().iter().next().unwrap();

        assert_relative_eq!(
            conditions.angle_of_incidence(&simulation_time),
            0.,
            epsilon = 1e-5
        );
        assert_relative_eq!(
            conditions.poai_beam(&simulation_time),
            800.,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            conditions.poai(&simulation_time),
            800. + 100. * (1. + 40f64.to_radians().cos()) / 2.,
            max_relative = 1e-12
        );
        assert_eq!(conditions.clearness_index(&simulation_time), 0.5);
    }

    #[rstest]
    fn test_nan_dni_is_not_replaced_by_zero_beam(geometry: SiteGeometry) {
        let series = series(vec![record(f64::NAN, 100., 500., 1000.)]);
        let conditions = ExternalConditions::from_sun_positions(
            &series,
            &geometry,
            vec![SunPosition::new(40., 180.)],
        )
        .unwrap();
        let simulation_time = series.simulation_time().iter().next().unwrap();

        assert_eq!(conditions.len(), 1);
        assert!(conditions.poai_beam(&simulation_time).is_nan());
        assert!(conditions.poai(&simulation_time).is_nan());
    }

    #[rstest]
    fn test_beam_is_clipped_when_sun_is_behind_array(geometry: SiteGeometry) {
        let series = series(vec![record(800., 100., 500., 1000.)]);
        // sun due north, low in the sky: behind a south-facing array
        let conditions = ExternalConditions::from_sun_positions(
            &series,
            &geometry,
            vec![SunPosition::new(80., 0.)],
        )
        .unwrap();
        let simulation_time = series.simulation_time().iter().next().unwrap();

        assert!(conditions.angle_of_incidence(&simulation_time) > 90.);
        assert_eq!(conditions.poai_beam(&simulation_time), 0.);
    }

    #[rstest]
    fn test_rejects_misaligned_sun_positions(geometry: SiteGeometry) {
        let series = series(vec![record(800., 100., 500., 1000.); 2]);
        assert!(matches!(
            ExternalConditions::from_sun_positions(
                &series,
                &geometry,
                vec![SunPosition::new(40., 180.)]
            ),
            Err(SolarPositionError::LengthMismatch {
                positions: 1,
                records: 2
            })
        ));
    }
}
