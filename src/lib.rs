mod compare_floats;
pub mod composer;
pub mod core;
pub mod errors;
pub mod external_conditions;
pub mod input;
pub mod lcoe;
pub mod output;
pub mod read_weather_file;
pub mod simulation_time;
mod statistics;
pub mod weather_cache;

#[macro_use]
extern crate is_close;

use crate::composer::{generate_input, InputTable};
use crate::core::optics::OpticalAngleTable;
use crate::errors::{OutputWriteError, TomcatInputsError};
use crate::input::RunConfig;
use crate::output::{write_outputs, Output};
use crate::read_weather_file::{weather_data_to_series, TmyWeather};
use std::io::Read;
use tracing::info;

/// Read a TMY3 weather file and an optics table, generate the time series for the configured
/// array and write it with the tilt file to `output`.
///
/// With `optics_case` set, only the rows of that case are read from a multi-case optics file.
pub fn run_project(
    tmy: impl Read,
    optics: impl Read,
    optics_case: Option<&str>,
    config: &RunConfig,
    output: impl Output,
) -> Result<InputTable, TomcatInputsError> {
    let weather = weather_data_to_series(tmy)?;
    let optics = match optics_case {
        Some(case) => OpticalAngleTable::case_from_reader(optics, case)?,
        None => OpticalAngleTable::from_reader(optics)?,
    };

    run_with_weather(&weather, &optics, config, output)
}

/// As [`run_project`], for weather and optics that have already been read.
pub fn run_with_weather(
    weather: &TmyWeather,
    optics: &OpticalAngleTable,
    config: &RunConfig,
    output: impl Output,
) -> Result<InputTable, TomcatInputsError> {
    let geometry = config.site_geometry(weather.location)?;

    let table = generate_input(&weather.series, &geometry, optics, config)?;

    if !output.is_noop() {
        write_outputs(&output, &table, geometry.array_tilt).map_err(OutputWriteError::new)?;
        info!(rows = table.rows.len(), "wrote TOMCAT input files");
    }

    Ok(table)
}

#[cfg(test)]
mod tests;
