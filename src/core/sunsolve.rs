//! Optics tables from PV Lighthouse SunSolve exports (as of SunSolve v3.5.3) of spectrally
//! and angularly resolved reflection, absorption and transmission.

use crate::core::optics::{OpticalAngleTable, OpticalSample, OpticsError};
use crate::statistics::{interp_extrapolate, trapezoid};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ANGLE_COLUMN: &str = "Source #1 zenith(°)";
const WAVELENGTH_COLUMN: &str = "Wavelength (nm)";
const SPECTRAL_INTENSITY_COLUMN: &str = "Spectral intensity (W m-2 nm-1)";
const PHOTON_FLUX_COLUMN: &str = "Photon flux in WL bin (A cm-2)";

/// Which absorptance columns of the export belong to each layer. Columns in a group are
/// summed.
#[derive(Clone, Debug)]
pub struct SunSolveColumns {
    pub glass: Vec<String>,
    pub front_encapsulant: Vec<String>,
    pub cell: Vec<String>,
    /// absorption in these columns generates photocurrent
    pub photocurrent: Vec<String>,
    pub angle: String,
}

#[derive(Clone, Debug)]
pub struct SunSolveOptions {
    pub columns: SunSolveColumns,
    /// current factor at normal incidence
    pub normal_incidence_current_factor: f64,
    /// rows preceding the header in the IQE file
    pub iqe_header_rows: usize,
}

impl SunSolveOptions {
    pub fn new(columns: SunSolveColumns) -> Self {
        Self {
            columns,
            normal_incidence_current_factor: 1.,
            iqe_header_rows: 2,
        }
    }
}

struct Spectrum {
    angle: f64,
    wavelengths: Vec<f64>,
    intensities: Vec<f64>,
    photon_fluxes: Vec<f64>,
    glass: Vec<f64>,
    front_encapsulant: Vec<f64>,
    cell: Vec<f64>,
    photocurrent: Vec<f64>,
}

impl Spectrum {
    fn new(angle: f64) -> Self {
        Self {
            angle,
            wavelengths: vec![],
            intensities: vec![],
            photon_fluxes: vec![],
            glass: vec![],
            front_encapsulant: vec![],
            cell: vec![],
            photocurrent: vec![],
        }
    }

    fn absorbed_power(&self, absorptance: &[f64]) -> f64 {
        let spectral_absorbed = self
            .intensities
            .iter()
            .zip(absorptance)
            .map(|(intensity, absorptance)| intensity * absorptance)
            .collect::<Vec<_>>();
        trapezoid(&spectral_absorbed, &self.wavelengths)
    }

    fn photocurrent(&self, iqe: &Iqe) -> f64 {
        self.wavelengths
            .iter()
            .zip(&self.photon_fluxes)
            .zip(&self.photocurrent)
            .map(|((wavelength, flux), absorptance)| iqe.at(*wavelength) * flux * absorptance)
            .sum()
    }
}

/// Internal quantum efficiency against wavelength, sorted by wavelength.
struct Iqe {
    wavelengths: Vec<f64>,
    efficiencies: Vec<f64>,
}

impl Iqe {
    fn from_reader(reader: impl Read, header_rows: usize) -> Result<Self, SunSolveError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut points = reader
            .records()
            .skip(header_rows + 1)
            .enumerate()
            .map(|(row, record)| {
                let record = record?;
                Ok((
                    parse_field(&record, 0, "IQE wavelength", row)?,
                    parse_field(&record, 1, "IQE", row)?,
                ))
            })
            .collect::<Result<Vec<(f64, f64)>, SunSolveError>>()?;
        if points.len() < 2 {
            return Err(SunSolveError::TooFewIqePoints(points.len()));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (wavelengths, efficiencies) = points.into_iter().unzip();
        Ok(Self {
            wavelengths,
            efficiencies,
        })
    }

    fn at(&self, wavelength: f64) -> f64 {
        interp_extrapolate(wavelength, &self.wavelengths, &self.efficiencies)
    }
}

fn parse_field(
    record: &StringRecord,
    index: usize,
    column: &str,
    row: usize,
) -> Result<f64, SunSolveError> {
    let raw = record.get(index).unwrap_or_default();
    raw.trim()
        .parse::<f64>()
        .map_err(|_| SunSolveError::InvalidValue {
            column: column.to_string(),
            row,
            value: raw.to_string(),
        })
}

/// Build an optics table from a SunSolve result export and an IQE file with columns of
/// wavelength (nm) and IQE. Produces one sample per distinct angle, in file order.
pub fn optics_from_sunsolve(
    results: impl Read,
    iqe: impl Read,
    options: &SunSolveOptions,
) -> Result<OpticalAngleTable, SunSolveError> {
    let iqe = Iqe::from_reader(iqe, options.iqe_header_rows)?;
    let spectra = read_spectra(results, &options.columns)?;

    let normal_photocurrent = spectra
        .iter()
        .find(|spectrum| spectrum.angle == 0.)
        .ok_or(SunSolveError::MissingNormalIncidence)?
        .photocurrent(&iqe);
    if normal_photocurrent == 0. {
        return Err(SunSolveError::ZeroNormalPhotocurrent);
    }

    let samples = spectra
        .iter()
        .map(|spectrum| {
            let sample = OpticalSample {
                angle: spectrum.angle,
                glass: spectrum.absorbed_power(&spectrum.glass),
                encapsulant: spectrum.absorbed_power(&spectrum.front_encapsulant),
                cell: spectrum.absorbed_power(&spectrum.cell),
                current_factor: options.normal_incidence_current_factor
                    * spectrum.photocurrent(&iqe)
                    / normal_photocurrent,
            };
            debug!(?sample, "integrated SunSolve spectrum");
            sample
        })
        .collect();

    Ok(OpticalAngleTable::new(samples)?)
}

fn read_spectra(
    results: impl Read,
    columns: &SunSolveColumns,
) -> Result<Vec<Spectrum>, SunSolveError> {
    let mut reader = ReaderBuilder::new().from_reader(results);
    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|heading| heading.trim() == name)
            .ok_or_else(|| SunSolveError::MissingColumn(name.to_string()))
    };
    let positions = |names: &[String]| {
        names
            .iter()
            .map(|name| position(name))
            .collect::<Result<Vec<_>, _>>()
    };

    let wavelength = position(WAVELENGTH_COLUMN)?;
    let angle = position(&columns.angle)?;
    let intensity = position(SPECTRAL_INTENSITY_COLUMN)?;
    let photon_flux = position(PHOTON_FLUX_COLUMN)?;
    let glass = positions(&columns.glass)?;
    let front_encapsulant = positions(&columns.front_encapsulant)?;
    let cell = positions(&columns.cell)?;
    let photocurrent = positions(&columns.photocurrent)?;

    let mut spectra: Vec<Spectrum> = vec![];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |index: usize| parse_field(&record, index, &headers[index], row);
        let sum = |indices: &[usize]| -> Result<f64, SunSolveError> {
            indices.iter().map(|index| field(*index)).sum()
        };

        let row_angle = field(angle)?;
        let spectrum = match spectra
            .iter()
            .position(|spectrum| spectrum.angle == row_angle)
        {
            Some(existing) => &mut spectra[existing],
            None => {
                spectra.push(Spectrum::new(row_angle));
                let last = spectra.len() - 1;
                &mut spectra[last]
            }
        };

        spectrum.wavelengths.push(field(wavelength)?);
        spectrum.intensities.push(field(intensity)?);
        spectrum.photon_fluxes.push(field(photon_flux)?);
        spectrum.glass.push(sum(&glass)?);
        spectrum.front_encapsulant.push(sum(&front_encapsulant)?);
        spectrum.cell.push(sum(&cell)?);
        spectrum.photocurrent.push(sum(&photocurrent)?);
    }

    Ok(spectra)
}

#[derive(Debug, Error)]
pub enum SunSolveError {
    #[error("SunSolve results are missing column '{0}'")]
    MissingColumn(String),
    #[error("Could not parse value '{value}' in column '{column}' on data row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
    #[error("IQE file needs at least 2 points, found {0}")]
    TooFewIqePoints(usize),
    #[error("Results for normal incidence must be included")]
    MissingNormalIncidence,
    #[error("Photocurrent at normal incidence is zero, so current factors are undefined")]
    ZeroNormalPhotocurrent,
    #[error(transparent)]
    Optics(#[from] OpticsError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const RESULTS: &str = "Wavelength (nm),Source #1 zenith(°),Spectral intensity (W m-2 nm-1),Photon flux in WL bin (A cm-2),Glass A,EVA A,Si A,Si back A\n\
        400,0,1.0,0.01,0.1,0.05,0.4,0.1\n\
        500,0,1.5,0.02,0.05,0.05,0.7,0.1\n\
        600,0,1.2,0.03,0.05,0.05,0.7,0.1\n\
        400,60,1.0,0.01,0.2,0.1,0.3,0\n\
        500,60,1.5,0.02,0.1,0.1,0.5,0\n\
        600,60,1.2,0.03,0.1,0.1,0.5,0\n";

    const IQE: &str = "IQE export\n\
        sample 17\n\
        Wavelength,IQE\n\
        600,0.9\n\
        400,0.8\n";

    #[fixture]
    fn options() -> SunSolveOptions {
        SunSolveOptions::new(SunSolveColumns {
            glass: vec!["Glass A".into()],
            front_encapsulant: vec!["EVA A".into()],
            cell: vec!["Si A".into(), "Si back A".into()],
            photocurrent: vec!["Si A".into(), "Si back A".into()],
            angle: DEFAULT_ANGLE_COLUMN.into(),
        })
    }

    #[rstest]
    fn should_integrate_absorption_over_wavelength(options: SunSolveOptions) {
        let table = optics_from_sunsolve(RESULTS.as_bytes(), IQE.as_bytes(), &options).unwrap();
        let samples = table.samples();

        assert_eq!(table.angles(), vec![0., 60.]);
        assert_relative_eq!(samples[0].glass, 15.5, max_relative = 1e-12);
        assert_relative_eq!(samples[0].encapsulant, 13., max_relative = 1e-12);
        assert_relative_eq!(samples[0].cell, 193., max_relative = 1e-12);
        assert_relative_eq!(samples[1].glass, 31., max_relative = 1e-12);
        assert_relative_eq!(samples[1].encapsulant, 26., max_relative = 1e-12);
        assert_relative_eq!(samples[1].cell, 120., max_relative = 1e-12);
    }

    #[rstest]
    fn should_weight_photocurrent_by_iqe(mut options: SunSolveOptions) {
        options.normal_incidence_current_factor = 0.98;
        let table = optics_from_sunsolve(RESULTS.as_bytes(), IQE.as_bytes(), &options).unwrap();
        let samples = table.samples();

        // IQE at 500 nm is interpolated to 0.85
        let normal = 0.8 * 0.01 * 0.5 + 0.85 * 0.02 * 0.8 + 0.9 * 0.03 * 0.8;
        let oblique = 0.8 * 0.01 * 0.3 + 0.85 * 0.02 * 0.5 + 0.9 * 0.03 * 0.5;
        assert_relative_eq!(samples[0].current_factor, 0.98, max_relative = 1e-12);
        assert_relative_eq!(
            samples[1].current_factor,
            0.98 * oblique / normal,
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn should_require_normal_incidence(options: SunSolveOptions) {
        let results = RESULTS
            .lines()
            .filter(|line| !line.contains(",0,1."))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(matches!(
            optics_from_sunsolve(results.as_bytes(), IQE.as_bytes(), &options),
            Err(SunSolveError::MissingNormalIncidence)
        ));
    }

    #[rstest]
    fn should_report_missing_columns(mut options: SunSolveOptions) {
        options.columns.glass = vec!["Glass B".into()];
        assert!(matches!(
            optics_from_sunsolve(RESULTS.as_bytes(), IQE.as_bytes(), &options),
            Err(SunSolveError::MissingColumn(column)) if column == "Glass B"
        ));
    }

    #[rstest]
    fn should_require_two_iqe_points(options: SunSolveOptions) {
        let iqe = "a\nb\nWavelength,IQE\n600,0.9\n";
        assert!(matches!(
            optics_from_sunsolve(RESULTS.as_bytes(), iqe.as_bytes(), &options),
            Err(SunSolveError::TooFewIqePoints(1))
        ));
    }
}
