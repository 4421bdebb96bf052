use crate::composer::ComposeError;
use crate::core::optics::OpticsError;
use crate::input::RunConfigError;
use crate::read_weather_file::WeatherFileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TomcatInputsError {
    #[error("Weather file was considered invalid due to error: {0}")]
    InvalidWeather(#[from] WeatherFileError),
    #[error("Optics file was considered invalid due to error: {0}")]
    InvalidOptics(#[from] OpticsError),
    #[error("Run configuration was considered invalid due to error: {0}")]
    InvalidConfig(#[from] RunConfigError),
    #[error("Error identified during input generation: {0}")]
    FailureInCalculation(#[from] ComposeError),
    #[error("Error while writing outputs: {0}")]
    FailureInOutput(#[from] OutputWriteError),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct OutputWriteError {
    error: anyhow::Error,
}

impl OutputWriteError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}
