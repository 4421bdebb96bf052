//! Caching of parsed weather so repeated runs for the same site skip re-reading and
//! re-validating the source. The store is chosen by the caller.

use crate::read_weather_file::TmyWeather;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info};

pub trait WeatherCache {
    fn get(&self, key: &str) -> anyhow::Result<Option<TmyWeather>>;

    fn put(&self, key: &str, weather: &TmyWeather) -> anyhow::Result<()>;

    /// Return the cached weather for `key`, or fetch it and cache the result.
    fn fetch_or_load(
        &self,
        key: &str,
        fetch: impl FnOnce() -> anyhow::Result<TmyWeather>,
    ) -> anyhow::Result<TmyWeather> {
        if let Some(weather) = self.get(key)? {
            debug!(key, "weather cache hit");
            return Ok(weather);
        }

        info!(key, "weather cache miss, fetching");
        let weather = fetch()?;
        self.put(key, &weather)?;

        Ok(weather)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWeatherCache {
    entries: Mutex<HashMap<String, TmyWeather>>,
}

impl WeatherCache for InMemoryWeatherCache {
    fn get(&self, key: &str) -> anyhow::Result<Option<TmyWeather>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, weather: &TmyWeather) -> anyhow::Result<()> {
        self.entries.lock().insert(key.to_string(), weather.clone());
        Ok(())
    }
}

/// One JSON document per key in a directory.
#[derive(Debug)]
pub struct FileWeatherCache {
    directory: PathBuf,
}

impl FileWeatherCache {
    pub fn new(directory: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        Ok(Self { directory })
    }

    /// Every byte other than an ASCII letter, digit or `-` is escaped as `_xx` (hex), so
    /// distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let file_stem = key.bytes().fold(String::new(), |mut stem, byte| {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(byte as char);
            } else {
                stem.push_str(&format!("_{byte:02x}"));
            }
            stem
        });
        self.directory.join(format!("{file_stem}.json"))
    }
}

impl WeatherCache for FileWeatherCache {
    fn get(&self, key: &str) -> anyhow::Result<Option<TmyWeather>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_reader(BufReader::new(File::open(
            path,
        )?))?))
    }

    fn put(&self, key: &str, weather: &TmyWeather) -> anyhow::Result<()> {
        let mut writer = BufWriter::new(File::create(self.path_for(key))?);
        serde_json::to_writer(&mut writer, weather)?;
        writer.flush()?;

        Ok(())
    }
}

/// Never stores anything, so every lookup fetches.
#[derive(Debug, Default)]
pub struct NoWeatherCache;

impl WeatherCache for NoWeatherCache {
    fn get(&self, _key: &str) -> anyhow::Result<Option<TmyWeather>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _weather: &TmyWeather) -> anyhow::Result<()> {
        Ok(())
    }
}
