//! Angle-resolved optical absorption tables, as measured in the lab or exported from a ray
//! tracer, referenced to 1000 W/m2 of incident irradiance.

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use strum::{Display, EnumIter};
use thiserror::Error;

/// Legacy tables carry the hemispherical response as a sample at this angle.
pub const DIFFUSE_MARKER_ANGLE: f64 = 180.;
const MAX_INCIDENCE_ANGLE: f64 = 90.;

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Glass,
    Encapsulant,
    Cell,
    CurrentDerate,
}

/// One row of an optics table.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct OpticalSample {
    /// angle of incidence, in degrees
    pub angle: f64,
    #[serde(rename = "glass_abs_W/m2")]
    pub glass: f64,
    #[serde(rename = "encapsulant_abs_W/m2", alias = "EVA_abs_W/m2")]
    pub encapsulant: f64,
    #[serde(rename = "cell_abs_W/m2")]
    pub cell: f64,
    #[serde(alias = "current_derate")]
    pub current_factor: f64,
}

impl OpticalSample {
    pub fn value(&self, layer: Layer) -> f64 {
        match layer {
            Layer::Glass => self.glass,
            Layer::Encapsulant => self.encapsulant,
            Layer::Cell => self.cell,
            Layer::CurrentDerate => self.current_factor,
        }
    }

    fn is_finite(&self) -> bool {
        [
            self.angle,
            self.glass,
            self.encapsulant,
            self.cell,
            self.current_factor,
        ]
        .iter()
        .all(|value| value.is_finite())
    }

    fn is_diffuse_marker(&self) -> bool {
        is_close!(self.angle, DIFFUSE_MARKER_ANGLE, abs_tol = 1e-9)
    }
}

// csv does not support flattening, so the optional case column needs its own row type
#[derive(Debug, Deserialize)]
struct OpticsRow {
    #[serde(default)]
    case: Option<String>,
    angle: f64,
    #[serde(rename = "glass_abs_W/m2")]
    glass: f64,
    #[serde(rename = "encapsulant_abs_W/m2", alias = "EVA_abs_W/m2")]
    encapsulant: f64,
    #[serde(rename = "cell_abs_W/m2")]
    cell: f64,
    #[serde(alias = "current_derate")]
    current_factor: f64,
}

impl OpticsRow {
    fn into_case_and_sample(self) -> (String, OpticalSample) {
        (
            self.case.unwrap_or_default(),
            OpticalSample {
                angle: self.angle,
                glass: self.glass,
                encapsulant: self.encapsulant,
                cell: self.cell,
                current_factor: self.current_factor,
            },
        )
    }
}

/// Samples at incidence angles within [0, 90] degrees, sorted by angle, plus the optional
/// measured diffuse sample.
#[derive(Clone, Debug, PartialEq)]
pub struct OpticalAngleTable {
    samples: Vec<OpticalSample>,
    diffuse: Option<OpticalSample>,
}

impl OpticalAngleTable {
    pub fn new(samples: Vec<OpticalSample>) -> Result<Self, OpticsError> {
        let mut angular = Vec::with_capacity(samples.len());
        let mut diffuse = None;

        for sample in samples {
            if !sample.is_finite() {
                return Err(OpticsError::NonFiniteValue {
                    angle: sample.angle,
                });
            }
            if sample.is_diffuse_marker() {
                if diffuse.replace(sample).is_some() {
                    return Err(OpticsError::DuplicateAngle(DIFFUSE_MARKER_ANGLE));
                }
            } else if (0. ..=MAX_INCIDENCE_ANGLE).contains(&sample.angle) {
                angular.push(sample);
            } else {
                return Err(OpticsError::AngleOutOfRange(sample.angle));
            }
        }

        angular.sort_by(|a, b| a.angle.total_cmp(&b.angle));
        if let Some((_, duplicate)) = angular
            .iter()
            .tuple_windows()
            .find(|(a, b)| is_close!(a.angle, b.angle, abs_tol = 1e-9))
        {
            return Err(OpticsError::DuplicateAngle(duplicate.angle));
        }
        if angular.len() < 2 {
            return Err(OpticsError::TooFewSamples(angular.len()));
        }

        Ok(Self {
            samples: angular,
            diffuse,
        })
    }

    /// Read a table from CSV. A `case` column is permitted as long as every row names the
    /// same case.
    pub fn from_reader(reader: impl Read) -> Result<Self, OpticsError> {
        let mut cases = Self::cases_from_reader(reader)?;
        if cases.len() > 1 {
            return Err(OpticsError::MultipleCases(cases.into_keys().collect()));
        }

        cases
            .pop()
            .map(|(_, table)| table)
            .ok_or(OpticsError::TooFewSamples(0))
    }

    /// Read the table for one named case from a CSV with a `case` column.
    pub fn case_from_reader(reader: impl Read, case: &str) -> Result<Self, OpticsError> {
        Self::cases_from_reader(reader)?
            .swap_remove(case)
            .ok_or_else(|| OpticsError::UnknownCase(case.to_string()))
    }

    /// Read every case in a CSV, in order of first appearance. Rows without a case are
    /// grouped under the empty name.
    pub fn cases_from_reader(
        reader: impl Read,
    ) -> Result<IndexMap<String, OpticalAngleTable>, OpticsError> {
        let mut grouped: IndexMap<String, Vec<OpticalSample>> = IndexMap::new();
        for row in csv::Reader::from_reader(reader).deserialize::<OpticsRow>() {
            let (case, sample) = row?.into_case_and_sample();
            grouped.entry(case).or_default().push(sample);
        }

        grouped
            .into_iter()
            .map(|(case, samples)| Ok((case, Self::new(samples)?)))
            .collect()
    }

    /// Write the table as CSV in the current column naming, diffuse sample last.
    pub fn write_csv(&self, writer: impl Write) -> Result<(), OpticsError> {
        let mut writer = csv::Writer::from_writer(writer);
        for sample in self.samples.iter().chain(self.diffuse.iter()) {
            writer.serialize(sample)?;
        }
        writer.flush()?;

        Ok(())
    }

    pub fn samples(&self) -> &[OpticalSample] {
        &self.samples
    }

    pub fn angles(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.angle).collect()
    }

    pub fn values(&self, layer: Layer) -> Vec<f64> {
        self.samples
            .iter()
            .map(|sample| sample.value(layer))
            .collect()
    }

    pub fn max_angle(&self) -> f64 {
        self.samples
            .last()
            .map(|sample| sample.angle)
            .unwrap_or_default()
    }

    pub fn diffuse_sample(&self) -> Option<&OpticalSample> {
        self.diffuse.as_ref()
    }
}

#[derive(Debug, Error)]
pub enum OpticsError {
    #[error("Optics table needs at least 2 samples between 0 and 90 degrees, found {0}")]
    TooFewSamples(usize),
    #[error("Optics angle {0} is outside 0 to 90 degrees and is not the diffuse marker 180")]
    AngleOutOfRange(f64),
    #[error("Optics table has more than one sample at {0} degrees")]
    DuplicateAngle(f64),
    #[error("Optics sample at {angle} degrees contains a non-finite value")]
    NonFiniteValue { angle: f64 },
    #[error("Optics file contains several cases ({}), choose one", .0.join(", "))]
    MultipleCases(Vec<String>),
    #[error("Optics file contains no case named '{0}'")]
    UnknownCase(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
