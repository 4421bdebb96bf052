use crate::composer::{compose, generate_input, ComposeError, InputTable, SiteGeometry};
use crate::core::angular_response::{AngularResponse, DiffuseModel, OpticsWarning};
use crate::core::optics::tests::sample;
use crate::core::optics::OpticalAngleTable;
use crate::core::units::Orientation360;
use crate::external_conditions::{ExternalConditions, SolarPositionError, SunPosition};
use crate::input::RunConfig;
use crate::read_weather_file::{SiteLocation, WeatherRecord, WeatherSeries};
use crate::simulation_time::SimulationTime;
use approx::assert_relative_eq;
use chrono::{TimeDelta, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::*;

fn record(dni: f64, dhi: f64, ghi: f64, etr: f64, dry_bulb: f64) -> WeatherRecord {
    WeatherRecord {
        dry_bulb,
        dew_point: 5.,
        wind_speed: 2.,
        dni,
        ghi,
        dhi,
        etr,
        pressure: 820.,
    }
}

fn series(records: Vec<WeatherRecord>) -> WeatherSeries {
    WeatherSeries::new(
        SimulationTime::new(
            Utc.with_ymd_and_hms(2017, 6, 21, 18, 0, 0).unwrap(),
            TimeDelta::hours(1),
            records.len(),
        )
        .unwrap(),
        records,
    )
    .unwrap()
}

#[fixture]
fn geometry() -> SiteGeometry {
    SiteGeometry {
        location: SiteLocation {
            latitude: 39.742,
            longitude: -105.179,
            elevation: 1829.,
            utc_offset: -7.,
        },
        array_tilt: 40.,
        array_azimuth: Orientation360::new(180.).unwrap(),
    }
}

#[fixture]
fn optics() -> OpticalAngleTable {
    OpticalAngleTable::new(vec![
        sample(0., 30., 20., 800., 1.),
        sample(60., 20., 12., 350., 0.45),
        sample(90., 0., 0., 0., 0.),
        sample(180., 25., 15., 600., 0.8),
    ])
    .unwrap()
}

#[fixture]
fn measured_diffuse() -> RunConfig {
    RunConfig {
        diffuse_model: DiffuseModel::MeasuredSample,
        ..Default::default()
    }
}

/// Sun facing the array at noon, the sun below the horizon, then the sun behind the array.
#[fixture]
fn three_conditions() -> (WeatherSeries, Vec<SunPosition>) {
    (
        series(vec![
            record(800., 100., 500., 1000., 20.),
            record(0., 0., 0., 0., 12.),
            record(500., 50., 300., 900., 15.),
        ]),
        vec![
            SunPosition::new(40., 180.),
            SunPosition::new(110., 0.),
            SunPosition::new(60., 0.),
        ],
    )
}

fn compose_with_positions(
    series: &WeatherSeries,
    positions: Vec<SunPosition>,
    geometry: &SiteGeometry,
    optics: &OpticalAngleTable,
    config: &RunConfig,
) -> Result<InputTable, ComposeError> {
    let conditions = ExternalConditions::from_sun_positions(series, geometry, positions)?;
    let angular_response = AngularResponse::build(
        optics,
        &config.interpolation_config(),
        config.diffuse_model,
    )?;
    compose(series, geometry, &conditions, &angular_response, config)
}

#[rstest]
fn should_compose_normal_incidence_row(
    three_conditions: (WeatherSeries, Vec<SunPosition>),
    geometry: SiteGeometry,
    optics: OpticalAngleTable,
    measured_diffuse: RunConfig,
) {
    let (series, positions) = three_conditions;
    let table =
        compose_with_positions(&series, positions, &geometry, &optics, &measured_diffuse).unwrap();
    let row = table.rows[0];

    let sky = 100. * (1. + 40f64.to_radians().cos()) / 2.;
    assert_relative_eq!(row.poai_beam, 800., max_relative = 1e-6);
    assert_relative_eq!(row.poai_diffuse, sky, max_relative = 1e-12);
    assert_relative_eq!(row.poai, 888.3022221559489, max_relative = 1e-6);
    assert_eq!(row.elapsed, 0.);
    assert_relative_eq!(row.temp, 293.15, max_relative = 1e-12);
    assert_eq!(row.dni, 800.);
    assert_eq!(row.wind_speed, 2.);
    // sun straight in front of a south-facing array
    assert_relative_eq!(
        row.elevation_projected,
        50f64.to_radians(),
        max_relative = 1e-9
    );

    assert_relative_eq!(
        row.abs_glass,
        (30. * 800. + 25. * sky) / 1000.,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        row.abs_encapsulant,
        (20. * 800. + 15. * sky) / 1000.,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        row.abs_cell,
        (800. * 800. + 600. * sky) / 1000.,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        row.current_factor,
        (800. + 0.8 * sky) / (800. + sky),
        max_relative = 1e-6
    );
    assert!(table.warnings.is_empty());
}

#[rstest]
fn should_zero_night_rows(
    three_conditions: (WeatherSeries, Vec<SunPosition>),
    geometry: SiteGeometry,
    optics: OpticalAngleTable,
    measured_diffuse: RunConfig,
) {
    let (series, positions) = three_conditions;
    let table =
        compose_with_positions(&series, positions, &geometry, &optics, &measured_diffuse).unwrap();
    let row = table.rows[1];

    assert_eq!(row.elapsed, 3600.);
    assert_eq!(row.poai, 0.);
    assert_eq!(row.elevation_projected, 0.);
    assert_eq!(row.abs_glass, 0.);
    assert_eq!(row.abs_cell, 0.);
    assert_eq!(row.current_factor, 0.);
}

#[rstest]
fn should_clip_beam_from_behind_the_array(
    three_conditions: (WeatherSeries, Vec<SunPosition>),
    geometry: SiteGeometry,
    optics: OpticalAngleTable,
    measured_diffuse: RunConfig,
) {
    let (series, positions) = three_conditions;
    let table =
        compose_with_positions(&series, positions, &geometry, &optics, &measured_diffuse).unwrap();
    let row = table.rows[2];

    let sky = 50. * (1. + 40f64.to_radians().cos()) / 2.;
    assert_eq!(row.poai_beam, 0.);
    assert_relative_eq!(row.poai, sky, max_relative = 1e-12);
    assert_relative_eq!(row.abs_glass, 25. * sky / 1000., max_relative = 1e-12);
    assert_relative_eq!(row.current_factor, 0.8, max_relative = 1e-12);
    assert_relative_eq!(
        row.elevation_projected,
        150f64.to_radians(),
        max_relative = 1e-9
    );
}

#[rstest]
fn should_warn_on_sparse_optics_and_stay_finite(
    three_conditions: (WeatherSeries, Vec<SunPosition>),
    geometry: SiteGeometry,
) {
    let (series, positions) = three_conditions;
    let sparse = OpticalAngleTable::new(vec![
        sample(0., 30., 20., 800., 1.),
        sample(60., 20., 12., 350., 0.45),
    ])
    .unwrap();

    let table =
        compose_with_positions(&series, positions, &geometry, &sparse, &RunConfig::default())
            .unwrap();

    assert_eq!(
        table.warnings,
        vec![OpticsWarning::SparseGrazingCoverage { max_angle: 60. }]
    );
    for row in &table.rows {
        for value in [
            row.temp_sky,
            row.temp_ground,
            row.abs_glass,
            row.abs_encapsulant,
            row.abs_cell,
            row.current_factor,
        ] {
            assert!(value.is_finite());
        }
    }
}

#[rstest]
fn should_keep_absorption_non_negative_with_hemispherical_average(
    three_conditions: (WeatherSeries, Vec<SunPosition>),
    geometry: SiteGeometry,
    optics: OpticalAngleTable,
) {
    let (series, positions) = three_conditions;
    let table =
        compose_with_positions(&series, positions, &geometry, &optics, &RunConfig::default())
            .unwrap();

    for row in &table.rows {
        assert!(row.abs_glass >= 0.);
        assert!(row.abs_encapsulant >= 0.);
        assert!(row.abs_cell >= 0.);
    }
}

#[rstest]
fn should_fail_on_misaligned_sun_positions(
    three_conditions: (WeatherSeries, Vec<SunPosition>),
    geometry: SiteGeometry,
    optics: OpticalAngleTable,
) {
    let (series, mut positions) = three_conditions;
    positions.pop();

    assert!(matches!(
        compose_with_positions(&series, positions, &geometry, &optics, &RunConfig::default()),
        Err(ComposeError::SolarPosition(_))
    ));
}

#[rstest]
fn should_fail_when_conditions_cover_fewer_steps_than_series(
    three_conditions: (WeatherSeries, Vec<SunPosition>),
    geometry: SiteGeometry,
    optics: OpticalAngleTable,
) {
    let (series_of_three, mut positions) = three_conditions;
    positions.truncate(1);
    let shorter = series(vec![record(800., 100., 500., 1000., 20.)]);
    let conditions = ExternalConditions::from_sun_positions(&shorter, &geometry, positions).unwrap();
    let config = RunConfig::default();
    let angular_response = AngularResponse::build(
        &optics,
        &config.interpolation_config(),
        config.diffuse_model,
    )
    .unwrap();

    assert!(matches!(
        compose(
            &series_of_three,
            &geometry,
            &conditions,
            &angular_response,
            &config
        ),
        Err(ComposeError::SolarPosition(
            SolarPositionError::LengthMismatch {
                positions: 1,
                records: 3
            }
        ))
    ));
}

#[rstest]
fn should_fail_below_absolute_zero(geometry: SiteGeometry, optics: OpticalAngleTable) {
    let series = series(vec![record(0., 0., 0., 0., -300.)]);

    assert!(matches!(
        compose_with_positions(
            &series,
            vec![SunPosition::new(120., 0.)],
            &geometry,
            &optics,
            &RunConfig::default()
        ),
        Err(ComposeError::Temperature { index: 0, .. })
    ));
}

#[rstest]
fn should_require_diffuse_sample_for_measured_model(
    geometry: SiteGeometry,
    measured_diffuse: RunConfig,
) {
    let optics = OpticalAngleTable::new(vec![
        sample(0., 30., 20., 800., 1.),
        sample(90., 0., 0., 0., 0.),
    ])
    .unwrap();

    assert!(matches!(
        generate_input(
            &series(vec![record(0., 0., 0., 0., 10.)]),
            &geometry,
            &optics,
            &measured_diffuse
        ),
        Err(ComposeError::AngularResponse(_))
    ));
}
