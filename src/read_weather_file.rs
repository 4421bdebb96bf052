use crate::core::units::{HOURS_PER_YEAR, SECONDS_PER_HOUR};
use crate::simulation_time::{SimulationTime, SimulationTimeIteration, TimeIndexError};
use crate::statistics::mean;
use chrono::{NaiveDate, TimeDelta};
use csv::ReaderBuilder as CsvReaderBuilder;
use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;

// positions within the TMY3 metadata row
const META_UTC_OFFSET: usize = 3;
const META_LATITUDE: usize = 4;
const META_LONGITUDE: usize = 5;
const META_ELEVATION: usize = 6;

const COLUMN_DRY_BULB: &str = "Dry-bulb (C)";
const COLUMN_DEW_POINT: &str = "Dew-point (C)";
const COLUMN_WIND_SPEED: &str = "Wspd (m/s)";
const COLUMN_DNI: &str = "DNI (W/m^2)";
const COLUMN_DHI: &str = "DHI (W/m^2)";
const COLUMN_GHI: &str = "GHI (W/m^2)";
const COLUMN_ETR: &str = "ETR (W/m^2)";
const COLUMN_PRESSURE: &str = "Pressure (mbar)";

/// TMY data is treated as belonging to 2017, a non-leap year, starting at hour 1.
const REFERENCE_YEAR: i32 = 2017;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct WeatherRecord {
    /// dry bulb air temperature, in deg C
    pub dry_bulb: f64,
    /// dew point temperature, in deg C
    pub dew_point: f64,
    /// in m/s
    pub wind_speed: f64,
    /// direct normal irradiance, in W/m2
    pub dni: f64,
    /// global horizontal irradiance, in W/m2
    pub ghi: f64,
    /// diffuse horizontal irradiance, in W/m2
    pub dhi: f64,
    /// extraterrestrial horizontal irradiance, in W/m2
    pub etr: f64,
    /// station pressure, in mbar
    pub pressure: f64,
}

impl WeatherRecord {
    fn irradiances(&self) -> [(&'static str, f64); 4] {
        [
            (COLUMN_DNI, self.dni),
            (COLUMN_GHI, self.ghi),
            (COLUMN_DHI, self.dhi),
            (COLUMN_ETR, self.etr),
        ]
    }
}

/// A weather time series at a fixed cadence. Each record describes the interval ending at its
/// timestamp.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WeatherSeries {
    simulation_time: SimulationTime,
    records: Vec<WeatherRecord>,
}

impl WeatherSeries {
    pub fn new(
        simulation_time: SimulationTime,
        records: Vec<WeatherRecord>,
    ) -> Result<Self, WeatherFileError> {
        if simulation_time.len() != records.len() {
            return Err(TimeIndexError::LengthMismatch {
                timestamps: simulation_time.len(),
                records: records.len(),
            }
            .into());
        }
        for (row, record) in records.iter().enumerate() {
            if let Some((column, value)) = record
                .irradiances()
                .into_iter()
                .find(|(_, value)| *value < 0.)
            {
                return Err(WeatherFileError::NegativeIrradiance { column, row, value });
            }
        }

        Ok(Self {
            simulation_time,
            records,
        })
    }

    pub fn simulation_time(&self) -> &SimulationTime {
        &self.simulation_time
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SimulationTimeIteration, &WeatherRecord)> {
        self.simulation_time.iter().zip(self.records.iter())
    }

    /// Mean station pressure over the series, in mbar.
    pub fn mean_pressure(&self) -> Option<f64> {
        mean(self.records.iter().map(|record| record.pressure))
    }

    /// Mean dry bulb temperature over the series, in deg C.
    pub fn mean_dry_bulb(&self) -> Option<f64> {
        mean(self.records.iter().map(|record| record.dry_bulb))
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SiteLocation {
    /// degrees north
    pub latitude: f64,
    /// degrees east
    pub longitude: f64,
    /// metres above sea level
    pub elevation: f64,
    /// offset of local standard time from UTC, in hours
    pub utc_offset: f64,
}

/// The contents of one TMY3 file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TmyWeather {
    pub location: SiteLocation,
    pub series: WeatherSeries,
}

pub fn weather_data_to_series(file: impl Read) -> Result<TmyWeather, WeatherFileError> {
    let mut reader = CsvReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);
    let mut records = reader.records();

    let metadata = records.next().ok_or(WeatherFileError::Empty)??;
    let location = parse_tmy_metadata(&metadata)?;

    let header = records.next().ok_or(WeatherFileError::MissingHeader)??;
    let column = |name: &'static str| {
        header
            .iter()
            .position(|heading| heading.trim() == name)
            .ok_or(WeatherFileError::MissingColumn(name))
    };
    let columns = TmyColumns {
        dry_bulb: column(COLUMN_DRY_BULB)?,
        dew_point: column(COLUMN_DEW_POINT)?,
        wind_speed: column(COLUMN_WIND_SPEED)?,
        dni: column(COLUMN_DNI)?,
        ghi: column(COLUMN_GHI)?,
        dhi: column(COLUMN_DHI)?,
        etr: column(COLUMN_ETR)?,
        pressure: column(COLUMN_PRESSURE)?,
    };

    let weather_records = records
        .enumerate()
        .map(|(row, record)| columns.parse_row(row, &record?))
        .collect::<Result<Vec<_>, _>>()?;

    if weather_records.len() != HOURS_PER_YEAR as usize {
        return Err(WeatherFileError::UnexpectedRowCount {
            expected: HOURS_PER_YEAR as usize,
            found: weather_records.len(),
        });
    }

    let first_local_timestamp = NaiveDate::from_ymd_opt(REFERENCE_YEAR, 1, 1)
        .and_then(|date| date.and_hms_opt(1, 0, 0))
        .ok_or(WeatherFileError::InvalidReferenceTime)?;
    let utc_offset =
        TimeDelta::try_seconds((location.utc_offset * SECONDS_PER_HOUR as f64).round() as i64)
            .ok_or(WeatherFileError::InvalidMetadataField {
                field: "UTC offset",
                value: location.utc_offset.to_string(),
            })?;
    let start = (first_local_timestamp - utc_offset).and_utc();

    let simulation_time =
        SimulationTime::new(start, TimeDelta::hours(1), weather_records.len())?;

    Ok(TmyWeather {
        location,
        series: WeatherSeries::new(simulation_time, weather_records)?,
    })
}

pub(crate) fn parse_tmy_metadata(
    metadata: &csv::StringRecord,
) -> Result<SiteLocation, WeatherFileError> {
    let field = |index: usize, name: &'static str| -> Result<f64, WeatherFileError> {
        let raw = metadata
            .get(index)
            .ok_or(WeatherFileError::MissingMetadataField(name))?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| WeatherFileError::InvalidMetadataField {
                field: name,
                value: raw.to_string(),
            })
    };

    Ok(SiteLocation {
        utc_offset: field(META_UTC_OFFSET, "UTC offset")?,
        latitude: field(META_LATITUDE, "latitude")?,
        longitude: field(META_LONGITUDE, "longitude")?,
        elevation: field(META_ELEVATION, "elevation")?,
    })
}

struct TmyColumns {
    dry_bulb: usize,
    dew_point: usize,
    wind_speed: usize,
    dni: usize,
    ghi: usize,
    dhi: usize,
    etr: usize,
    pressure: usize,
}

impl TmyColumns {
    fn parse_row(
        &self,
        row: usize,
        record: &csv::StringRecord,
    ) -> Result<WeatherRecord, WeatherFileError> {
        let value = |index: usize, column: &'static str| -> Result<f64, WeatherFileError> {
            let raw = record.get(index).unwrap_or_default();
            raw.trim()
                .parse::<f64>()
                .map_err(|_| WeatherFileError::InvalidValue {
                    column,
                    row,
                    value: raw.to_string(),
                })
        };

        Ok(WeatherRecord {
            dry_bulb: value(self.dry_bulb, COLUMN_DRY_BULB)?,
            dew_point: value(self.dew_point, COLUMN_DEW_POINT)?,
            wind_speed: value(self.wind_speed, COLUMN_WIND_SPEED)?,
            dni: value(self.dni, COLUMN_DNI)?,
            ghi: value(self.ghi, COLUMN_GHI)?,
            dhi: value(self.dhi, COLUMN_DHI)?,
            etr: value(self.etr, COLUMN_ETR)?,
            pressure: value(self.pressure, COLUMN_PRESSURE)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum WeatherFileError {
    #[error("Weather file is empty")]
    Empty,
    #[error("Weather file metadata row has no {0} field")]
    MissingMetadataField(&'static str),
    #[error("Could not parse {field} from weather file metadata value '{value}'")]
    InvalidMetadataField { field: &'static str, value: String },
    #[error("Weather file has no column header row")]
    MissingHeader,
    #[error("Weather file is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("Could not parse value '{value}' in column '{column}' on data row {row}")]
    InvalidValue {
        column: &'static str,
        row: usize,
        value: String,
    },
    #[error("Negative irradiance {value} in column '{column}' on data row {row}")]
    NegativeIrradiance {
        column: &'static str,
        row: usize,
        value: f64,
    },
    #[error("Expected {expected} hourly rows in weather file but found {found}")]
    UnexpectedRowCount { expected: usize, found: usize },
    #[error("Could not construct the reference start time for weather data")]
    InvalidReferenceTime,
    #[error(transparent)]
    TimeIndex(#[from] TimeIndexError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
