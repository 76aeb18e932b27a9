//! Ordered multi-source resolution with a static last resort

use tracing::{debug, warn};

use super::resource::{ResourceDescriptor, Validator};
use super::source::{Source, SourceError, Sourced};
use crate::cache::Clock;

/// Resolves a resource by trying its sources strictly in order
///
/// The first source that answers within its timeout and passes the
/// descriptor's validator wins. Failures are logged and never returned:
/// when every source fails the descriptor's fallback value is served,
/// tagged with the fallback label.
pub async fn fetch_with_fallback<T>(descriptor: &ResourceDescriptor<T>, clock: &dyn Clock) -> Sourced<T>
where
    T: Send,
{
    for source in &descriptor.sources {
        match attempt(source.as_ref(), descriptor.validator).await {
            Ok(data) => {
                debug!(
                    resource = descriptor.name,
                    source = source.name(),
                    "resolved from live source"
                );
                return Sourced::live(data, source.name(), clock.now());
            }
            Err(error) => {
                warn!(
                    resource = descriptor.name,
                    source = source.name(),
                    kind = %error.kind(),
                    error = %error,
                    "source failed"
                );
            }
        }
    }

    warn!(
        resource = descriptor.name,
        fallback = descriptor.fallback.label,
        attempted = descriptor.sources.len(),
        "all sources failed, serving fallback"
    );
    Sourced::fallback(
        (descriptor.fallback.value)(),
        descriptor.fallback.label,
        clock.now(),
    )
}

/// Runs one source under its timeout and applies the validator
async fn attempt<T>(source: &dyn Source<T>, validator: Validator<T>) -> Result<T, SourceError>
where
    T: Send,
{
    let timeout = source.timeout();
    let data = tokio::time::timeout(timeout, source.fetch())
        .await
        .map_err(|_| SourceError::Timeout(timeout))??;
    validator(&data).map_err(SourceError::InvalidPayload)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::fetch::{Fallback, Origin};
    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone, Utc};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Volume {
        volume_24h: f64,
    }

    enum Behaviour {
        Return(f64),
        Fail,
        Hang,
    }

    struct Stub {
        name: &'static str,
        behaviour: Behaviour,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Source<Volume> for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn fetch(&self) -> Result<Volume, SourceError> {
            self.log.lock().push(self.name);
            match self.behaviour {
                Behaviour::Return(volume_24h) => Ok(Volume { volume_24h }),
                Behaviour::Fail => Err(SourceError::Status(reqwest::StatusCode::BAD_GATEWAY)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Volume { volume_24h: 1.0 })
                }
            }
        }
    }

    fn positive_volume(volume: &Volume) -> Result<(), String> {
        if volume.volume_24h > 0.0 {
            Ok(())
        } else {
            Err(format!("volume {} is not positive", volume.volume_24h))
        }
    }

    fn descriptor(
        stubs: Vec<(&'static str, Behaviour)>,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> ResourceDescriptor<Volume> {
        let fallback = Fallback {
            label: "Market Estimate",
            value: || Volume {
                volume_24h: 95_000_000_000.0,
            },
        };
        let mut descriptor = ResourceDescriptor::new("volume", TimeDelta::minutes(2), fallback)
            .validator(positive_volume);
        for (name, behaviour) in stubs {
            descriptor = descriptor.source(Stub {
                name,
                behaviour,
                log: log.clone(),
            });
        }
        descriptor
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap())
    }

    #[tokio::test]
    async fn test_primary_wins_and_secondary_untouched() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = descriptor(
            vec![
                ("CoinGecko", Behaviour::Return(10.0)),
                ("Binance", Behaviour::Return(20.0)),
            ],
            &log,
        );

        let result = fetch_with_fallback(&descriptor, &clock()).await;

        assert_eq!(result.data.volume_24h, 10.0);
        assert_eq!(result.source, "CoinGecko");
        assert_eq!(result.origin, Origin::Live);
        assert_eq!(*log.lock(), vec!["CoinGecko"]);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_secondary() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = descriptor(
            vec![
                ("CoinGecko", Behaviour::Fail),
                ("Binance", Behaviour::Return(20.0)),
            ],
            &log,
        );

        let result = fetch_with_fallback(&descriptor, &clock()).await;

        assert_eq!(result.data.volume_24h, 20.0);
        assert_eq!(result.source, "Binance");
        assert_eq!(*log.lock(), vec!["CoinGecko", "Binance"]);
    }

    #[tokio::test]
    async fn test_zero_sentinel_falls_through_like_an_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = descriptor(
            vec![
                ("CoinGecko", Behaviour::Return(0.0)),
                ("Binance", Behaviour::Return(20.0)),
            ],
            &log,
        );

        let result = fetch_with_fallback(&descriptor, &clock()).await;

        assert_eq!(result.source, "Binance");
        assert_eq!(result.data.volume_24h, 20.0);
    }

    #[tokio::test]
    async fn test_all_failed_serves_fallback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = descriptor(
            vec![("CoinGecko", Behaviour::Fail), ("Binance", Behaviour::Return(0.0))],
            &log,
        );
        let clock = clock();

        let result = fetch_with_fallback(&descriptor, &clock).await;

        assert!(result.is_fallback());
        assert_eq!(result.source, "Market Estimate");
        assert_eq!(result.data.volume_24h, 95_000_000_000.0);
        assert_eq!(result.last_updated, clock.now());
        assert_eq!(*log.lock(), vec!["CoinGecko", "Binance"]);
    }

    #[tokio::test]
    async fn test_no_sources_serves_fallback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = descriptor(vec![], &log);

        let result = fetch_with_fallback(&descriptor, &clock()).await;

        assert!(result.is_fallback());
    }

    #[tokio::test]
    async fn test_hanging_source_times_out_and_falls_through() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let descriptor = descriptor(
            vec![
                ("Slow", Behaviour::Hang),
                ("Binance", Behaviour::Return(30.0)),
            ],
            &log,
        );

        let result = fetch_with_fallback(&descriptor, &clock()).await;

        assert_eq!(result.source, "Binance");
        assert_eq!(result.data.volume_24h, 30.0);
    }

    #[tokio::test]
    async fn test_attempt_reports_timeout() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stub = Stub {
            name: "Slow",
            behaviour: Behaviour::Hang,
            log,
        };

        let error = attempt(&stub, positive_volume).await.unwrap_err();

        assert!(matches!(error, SourceError::Timeout(d) if d == Duration::from_millis(50)));
    }
}
