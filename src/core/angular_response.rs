//! Continuous per-layer optical response built from a sparse optics table.
//!
//! Measured absorption at an incidence angle already includes the cosine projection of the
//! incident beam onto the module. The response functions here divide that projection out, so
//! they give absorbed power per 1000 W/m2 of beam irradiance measured in the module plane.

use crate::core::optics::{Layer, OpticalAngleTable};
use crate::statistics::{interp_extrapolate, trapezoid};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, warn};

/// Absorption is taken to vanish at grazing incidence.
pub const GRAZING_ANGLE: f64 = 90.;
/// Below this maximum sampled angle, extrapolation towards grazing incidence is unreliable.
pub const MIN_RELIABLE_MAX_ANGLE: f64 = 85.;

/// Uniform zenith angle grid for hemispherical averaging, in degrees.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub step: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            lower_limit: 0.,
            upper_limit: 90.,
            step: 1.,
        }
    }
}

impl InterpolationConfig {
    /// Grid points from the lower limit up to and including the upper limit. The upper end
    /// is padded by a tenth of a step so that it survives floating point accumulation.
    pub fn grid(&self) -> Result<Vec<f64>, AngularResponseError> {
        if !(self.step.is_finite() && self.step > 0.) {
            return Err(AngularResponseError::InvalidStep(self.step));
        }

        let stop = self.upper_limit + self.step / 10.;
        let count = ((stop - self.lower_limit) / self.step).ceil().max(0.) as usize;
        let grid = (0..count)
            .map(|i| self.lower_limit + i as f64 * self.step)
            .collect::<Vec<_>>();

        if grid.len() < 2 {
            return Err(AngularResponseError::DegenerateGrid {
                lower_limit: self.lower_limit,
                upper_limit: self.upper_limit,
            });
        }

        Ok(grid)
    }
}

/// Sine-weighted average of `y(theta)` over the hemisphere, `theta` being the zenith angle in
/// degrees. This is the response of a quantity to isotropic diffuse illumination.
pub fn hemispherical_average(
    theta: &[f64],
    y: &[f64],
    config: &InterpolationConfig,
) -> Result<f64, AngularResponseError> {
    check_samples(theta, y)?;

    let theta_grid = config.grid()?;
    let weighted = theta_grid
        .iter()
        .map(|angle| interp_extrapolate(*angle, theta, y) * angle.to_radians().sin())
        .collect::<Vec<_>>();
    let theta_grid = theta_grid
        .into_iter()
        .map(f64::to_radians)
        .collect::<Vec<_>>();
    let sines = theta_grid.iter().map(|angle| angle.sin()).collect::<Vec<_>>();

    Ok(trapezoid(&weighted, &theta_grid) / trapezoid(&sines, &theta_grid))
}

fn check_samples(angles: &[f64], values: &[f64]) -> Result<(), AngularResponseError> {
    if angles.len() != values.len() {
        return Err(AngularResponseError::LengthMismatch {
            angles: angles.len(),
            values: values.len(),
        });
    }
    if angles.len() < 2 {
        return Err(AngularResponseError::TooFewSamples(angles.len()));
    }
    if angles.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(AngularResponseError::UnsortedAngles);
    }

    Ok(())
}

/// Linear interpolation of de-projected absorption over incidence angle, extrapolating
/// outside the sampled range.
#[derive(Clone, Debug, PartialEq)]
pub struct AngularResponseFunction {
    angles: Vec<f64>,
    responses: Vec<f64>,
}

impl AngularResponseFunction {
    pub fn new(angles: &[f64], absorbed: &[f64]) -> Result<Self, AngularResponseError> {
        check_samples(angles, absorbed)?;

        Ok(Self {
            angles: angles.to_vec(),
            responses: angles
                .iter()
                .zip(absorbed)
                .map(|(angle, absorbed)| absorbed / angle.to_radians().cos())
                .collect(),
        })
    }

    /// Response at an angle of incidence in degrees.
    pub fn evaluate(&self, angle_of_incidence: f64) -> f64 {
        interp_extrapolate(angle_of_incidence, &self.angles, &self.responses)
    }
}

/// Source of the per-layer response to isotropic diffuse irradiance.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffuseModel {
    /// sine-weighted average of the angular samples
    #[default]
    HemisphericalAverage,
    /// the sample recorded at the 180 degree marker angle
    MeasuredSample,
}

/// Conditions that make results questionable without preventing them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OpticsWarning {
    SparseGrazingCoverage { max_angle: f64 },
}

impl Display for OpticsWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpticsWarning::SparseGrazingCoverage { max_angle } => write!(
                f,
                "The maximum angle in the optics table is {max_angle} degrees (<{MIN_RELIABLE_MAX_ANGLE}). \
                 Optical data at high angles is required; responses are extrapolated to \
                 {GRAZING_ANGLE} degrees but the results may be unphysical"
            ),
        }
    }
}

/// Response functions and diffuse coefficients for every layer of one optics table.
#[derive(Clone, Debug)]
pub struct AngularResponse {
    functions: IndexMap<Layer, AngularResponseFunction>,
    diffuse_coefficients: IndexMap<Layer, f64>,
    warnings: Vec<OpticsWarning>,
}

impl AngularResponse {
    pub fn build(
        table: &OpticalAngleTable,
        config: &InterpolationConfig,
        diffuse_model: DiffuseModel,
    ) -> Result<Self, AngularResponseError> {
        let mut warnings = vec![];

        let max_angle = table.max_angle();
        if max_angle < MIN_RELIABLE_MAX_ANGLE {
            let warning = OpticsWarning::SparseGrazingCoverage { max_angle };
            warn!("{warning}");
            warnings.push(warning);
        }

        // zero absorption at grazing incidence keeps the extrapolation from going negative
        let mut angles = table.angles();
        let synthesize_grazing = !angles
            .iter()
            .any(|angle| is_close!(*angle, GRAZING_ANGLE, abs_tol = 1e-9));
        if synthesize_grazing {
            angles.push(GRAZING_ANGLE);
        }

        let mut functions = IndexMap::new();
        let mut diffuse_coefficients = IndexMap::new();
        for layer in Layer::iter() {
            let mut values = table.values(layer);
            if synthesize_grazing {
                values.push(0.);
            }

            let diffuse_coefficient = match diffuse_model {
                DiffuseModel::HemisphericalAverage => {
                    hemispherical_average(&angles, &values, config)?
                }
                DiffuseModel::MeasuredSample => table
                    .diffuse_sample()
                    .ok_or(AngularResponseError::MissingDiffuseSample)?
                    .value(layer),
            };
            debug!(%layer, diffuse_coefficient, "built angular response");

            functions.insert(layer, AngularResponseFunction::new(&angles, &values)?);
            diffuse_coefficients.insert(layer, diffuse_coefficient);
        }

        Ok(Self {
            functions,
            diffuse_coefficients,
            warnings,
        })
    }

    /// Response of a layer to beam irradiance at the given angle of incidence, in degrees.
    pub fn beam_response(&self, layer: Layer, angle_of_incidence: f64) -> f64 {
        self.functions[&layer].evaluate(angle_of_incidence)
    }

    pub fn diffuse_coefficient(&self, layer: Layer) -> f64 {
        self.diffuse_coefficients[&layer]
    }

    pub fn functions(&self) -> &IndexMap<Layer, AngularResponseFunction> {
        &self.functions
    }

    pub fn diffuse_coefficients(&self) -> &IndexMap<Layer, f64> {
        &self.diffuse_coefficients
    }

    pub fn warnings(&self) -> &[OpticsWarning] {
        &self.warnings
    }
}

#[derive(Debug, Error)]
pub enum AngularResponseError {
    #[error("Got {angles} angles but {values} values")]
    LengthMismatch { angles: usize, values: usize },
    #[error("At least 2 angular samples are needed, got {0}")]
    TooFewSamples(usize),
    #[error("Angles must be strictly increasing")]
    UnsortedAngles,
    #[error("Interpolation step must be positive, got {0}")]
    InvalidStep(f64),
    #[error("Interpolation grid from {lower_limit} to {upper_limit} degrees has fewer than 2 points")]
    DegenerateGrid { lower_limit: f64, upper_limit: f64 },
    #[error("Measured diffuse model requires a sample at the 180 degree marker angle")]
    MissingDiffuseSample,
}
