use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fixed-cadence sequence of UTC timestamps, one per weather record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SimulationTime {
    start: DateTime<Utc>,
    step_seconds: i64,
    len: usize,
}

impl SimulationTime {
    pub fn new(start: DateTime<Utc>, step: TimeDelta, len: usize) -> Result<Self, TimeIndexError> {
        let step_seconds = step.num_seconds();
        if step_seconds <= 0 || step != TimeDelta::seconds(step_seconds) {
            return Err(TimeIndexError::InvalidStep(step));
        }

        Ok(Self {
            start,
            step_seconds,
            len,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn step(&self) -> TimeDelta {
        TimeDelta::seconds(self.step_seconds)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> SimulationTimeIterator {
        SimulationTimeIterator {
            current_index: 0,
            simulation_time: self.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulationTimeIterator {
    current_index: usize,
    simulation_time: SimulationTime,
}

impl Iterator for SimulationTimeIterator {
    type Item = SimulationTimeIteration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.simulation_time.len {
            return None;
        }

        let index = self.current_index;
        self.current_index += 1;

        let elapsed = TimeDelta::seconds(self.simulation_time.step_seconds * index as i64);
        Some(SimulationTimeIteration {
            index,
            time: self.simulation_time.start + elapsed,
            step: self.simulation_time.step(),
            elapsed,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.simulation_time.len - self.current_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SimulationTimeIterator {}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationTimeIteration {
    pub index: usize,
    /// The timestamp labelling the end of the interval this record covers.
    pub time: DateTime<Utc>,
    pub step: TimeDelta,
    elapsed: TimeDelta,
}

impl SimulationTimeIteration {
    /// The instant halfway through the interval that ends at this timestamp. Irradiance
    /// records are interval averages, so this is where the sun position is representative.
    pub fn interval_midpoint(&self) -> DateTime<Utc> {
        self.time - self.step / 2
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.num_milliseconds() as f64 / 1000.
    }
}

#[derive(Debug, Error)]
pub enum TimeIndexError {
    #[error("Time series step must be a positive whole number of seconds, got {0}")]
    InvalidStep(TimeDelta),
    #[error("Time index has {timestamps} entries but {records} weather records were provided")]
    LengthMismatch { timestamps: usize, records: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn simulation_time() -> SimulationTime {
        SimulationTime::new(
            Utc.with_ymd_and_hms(2017, 1, 1, 8, 0, 0).unwrap(),
            TimeDelta::hours(1),
            4,
        )
        .unwrap()
    }

    #[rstest]
    fn should_iterate_hourly_timestamps(simulation_time: SimulationTime) {
        let times = simulation_time.iter().map(|it| it.time).collect::<Vec<_>>();
        assert_eq!(times.len(), 4);
        assert_eq!(times[3], Utc.with_ymd_and_hms(2017, 1, 1, 11, 0, 0).unwrap());
    }

    #[rstest]
    fn should_report_elapsed_seconds_from_first_timestamp(simulation_time: SimulationTime) {
        let elapsed = simulation_time
            .iter()
            .map(|it| it.elapsed_seconds())
            .collect::<Vec<_>>();
        assert_eq!(elapsed, vec![0., 3600., 7200., 10800.]);
    }

    #[rstest]
    fn should_place_midpoint_half_a_step_earlier(simulation_time: SimulationTime) {
        let first = simulation_time.iter().next().unwrap();
        assert_eq!(
            first.interval_midpoint(),
            Utc.with_ymd_and_hms(2017, 1, 1, 7, 30, 0).unwrap()
        );
    }

    #[rstest]
    #[case(TimeDelta::zero())]
    #[case(TimeDelta::hours(-1))]
    #[case(TimeDelta::milliseconds(1500))]
    fn should_reject_invalid_steps(#[case] step: TimeDelta) {
        let start = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        assert!(SimulationTime::new(start, step, 3).is_err());
    }
}
