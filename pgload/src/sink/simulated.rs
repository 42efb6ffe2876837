use rand::Rng;
use std::time::Duration;

use crate::bail;
use crate::benchmark::Job;
use crate::error::{ErrorKind, LoadResult};
use crate::sink::Sink;

/// How long a simulated call takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyProfile {
    Fixed(Duration),
    /// Uniformly distributed between `min` and `max`, both inclusive.
    Uniform { min: Duration, max: Duration },
}

impl LatencyProfile {
    fn sample(&self) -> Duration {
        match *self {
            LatencyProfile::Fixed(latency) => latency,
            LatencyProfile::Uniform { min, max } if min < max => {
                rand::thread_rng().gen_range(min..=max)
            }
            LatencyProfile::Uniform { min, .. } => min,
        }
    }
}

/// Sink standing in for a remote call by sleeping, failing with a configured probability.
#[derive(Debug, Clone)]
pub struct SimulatedSink {
    latency: LatencyProfile,
    failure_rate: f64,
}

impl SimulatedSink {
    pub fn new(latency: LatencyProfile) -> Self {
        Self {
            latency,
            failure_rate: 0.0,
        }
    }

    /// Makes each call fail with probability `failure_rate`, which must be within `[0, 1]`.
    pub fn with_failure_rate(mut self, failure_rate: f64) -> LoadResult<Self> {
        if !(0.0..=1.0).contains(&failure_rate) {
            bail!(
                ErrorKind::ConfigError,
                "The failure rate must be between 0 and 1",
                format!("Got {failure_rate}")
            );
        }

        self.failure_rate = failure_rate;

        Ok(self)
    }
}

impl Sink for SimulatedSink {
    type Unit = Job;

    fn name() -> &'static str {
        "simulated"
    }

    async fn apply(&self, job: &Job) -> LoadResult<()> {
        let (latency, fail) = {
            let mut rng = rand::thread_rng();
            let latency = self.latency.sample();
            (latency, rng.gen_bool(self.failure_rate))
        };

        tokio::time::sleep(latency).await;

        if fail {
            bail!(
                ErrorKind::SinkSimulatedFailure,
                "The simulated call failed",
                format!("{} failed after {latency:?}", job.label)
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fixed_latency_is_slept() {
        let sink = SimulatedSink::new(LatencyProfile::Fixed(Duration::from_millis(250)));
        let started = Instant::now();

        sink.apply(&Job::new(1)).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn uniform_latency_stays_in_range() {
        let min = Duration::from_millis(10);
        let max = Duration::from_millis(20);
        let sink = SimulatedSink::new(LatencyProfile::Uniform { min, max });

        for id in 1..=20 {
            let started = Instant::now();
            sink.apply(&Job::new(id)).await.unwrap();

            let elapsed = started.elapsed();
            assert!(elapsed >= min && elapsed <= max + Duration::from_millis(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn certain_failure_is_reported() {
        let sink = SimulatedSink::new(LatencyProfile::Fixed(Duration::ZERO))
            .with_failure_rate(1.0)
            .unwrap();

        let err = sink.apply(&Job::new(3)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SinkSimulatedFailure);
    }

    #[test]
    fn failure_rate_outside_unit_interval_is_rejected() {
        let sink = SimulatedSink::new(LatencyProfile::Fixed(Duration::ZERO));

        assert!(sink.clone().with_failure_rate(1.5).is_err());
        assert!(sink.with_failure_rate(-0.1).is_err());
    }
}
