use crate::composer::InputTable;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// The files a run produces for the finite element model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFile {
    TimeSeries,
    Tilt,
}

pub trait Output: Debug {
    /// A writer for the given file, or `None` if that file should not be written.
    fn writer_for(&self, file: OutputFile) -> anyhow::Result<Option<impl Write>>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

impl<T: Output> Output for &T {
    fn writer_for(&self, file: OutputFile) -> anyhow::Result<Option<impl Write>> {
        <T as Output>::writer_for(self, file)
    }

    fn is_noop(&self) -> bool {
        <T as Output>::is_noop(self)
    }
}

#[derive(Debug)]
pub struct FileOutput {
    time_series_path: Option<PathBuf>,
    tilt_path: Option<PathBuf>,
}

impl FileOutput {
    /// Both targets are checked up front so that a bad path fails the run before anything
    /// is written. A `None` path suppresses that file.
    pub fn new(
        time_series_path: Option<PathBuf>,
        tilt_path: Option<PathBuf>,
    ) -> Result<Self, OutputPathError> {
        for path in [&time_series_path, &tilt_path].into_iter().flatten() {
            check_writable_path(path)?;
        }

        Ok(Self {
            time_series_path,
            tilt_path,
        })
    }
}

fn check_writable_path(path: &Path) -> Result<(), OutputPathError> {
    if path.as_os_str().is_empty() {
        return Err(OutputPathError::Empty);
    }
    if path.is_dir() {
        return Err(OutputPathError::IsDirectory(path.to_path_buf()));
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(
            OutputPathError::MissingParentDirectory(path.to_path_buf()),
        ),
        _ => Ok(()),
    }
}

impl Output for FileOutput {
    fn writer_for(&self, file: OutputFile) -> anyhow::Result<Option<impl Write>> {
        let path = match file {
            OutputFile::TimeSeries => &self.time_series_path,
            OutputFile::Tilt => &self.tilt_path,
        };

        Ok(match path {
            Some(path) => Some(BufWriter::new(File::create(path)?)),
            None => None,
        })
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for(&self, _file: OutputFile) -> anyhow::Result<Option<impl Write>> {
        Ok(Some(io::sink()))
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Write the time series and tilt files. Both writers are opened before either file is
/// written, so a target that cannot be opened leaves the other file untouched.
pub fn write_outputs(
    output: &impl Output,
    table: &InputTable,
    array_tilt: f64,
) -> anyhow::Result<()> {
    let time_series_writer = output.writer_for(OutputFile::TimeSeries)?;
    let tilt_writer = output.writer_for(OutputFile::Tilt)?;

    if let Some(writer) = time_series_writer {
        info!(rows = table.rows.len(), "writing time series");
        table.write_csv(writer)?;
    }
    if let Some(writer) = tilt_writer {
        write_tilt(writer, array_tilt)?;
    }

    Ok(())
}

/// The tilt file holds the array tilt in degrees as a single number.
fn write_tilt(mut writer: impl Write, array_tilt: f64) -> io::Result<()> {
    write!(writer, "{array_tilt:?}")?;
    writer.flush()
}

#[derive(Debug, Error)]
pub enum OutputPathError {
    #[error("Output file path must not be empty")]
    Empty,
    #[error("Output file path {0:?} is a directory")]
    IsDirectory(PathBuf),
    #[error("Directory for output file {0:?} does not exist")]
    MissingParentDirectory(PathBuf),
}
