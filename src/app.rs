//! Core application runner (business logic) for `beacon-listener`.
//!
//! This module is intentionally decoupled from CLI parsing and process exit
//! codes so it can be tested deterministically with an injected scanner and
//! in-memory output streams. It owns the single-writer loop the registry
//! assumes: one task consumes the scanner channel and drives `receive`.

use crate::alias::{Alias, AliasMap};
use crate::beacon::BeaconType;
use crate::events::{BeaconEvent, EventSink};
use crate::frame::FrameError;
use crate::registry::{BeaconRegistry, RegistryConfig};
use crate::scanner::{AdvertisementResult, Backend, ScanError};
use crate::throttle::Throttle;
use clap::Parser;
use std::future::Future;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Configuration for the core run loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Remove beacons not seen for this long when a new address arrives.
    /// Accepts duration with suffix: 10s, 1m, 500ms.
    #[arg(long, value_parser = crate::throttle::parse_duration, default_value = "10s")]
    pub expiry: Duration,

    /// Only track beacons of the given type; repeat to allow several.
    /// Without this option all beacon types are tracked.
    #[arg(long = "filter", value_enum, value_name = "TYPE")]
    pub filters: Vec<BeaconType>,

    /// Specify human-readable alias for a beacon address.
    /// Format: --alias DE:AD:BE:EF:00:00=Doorway
    #[arg(long = "alias", value_parser = crate::alias::parse_alias, value_name = "ALIAS")]
    pub aliases: Vec<Alias>,

    /// Verbose output, print scanner errors
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Limit printed update events to at most one per beacon per interval.
    /// Added/removed events are always printed.
    #[arg(long, value_parser = crate::throttle::parse_duration)]
    pub throttle: Option<Duration>,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,
}

impl Options {
    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            staleness: self.expiry,
            allowed_types: if self.filters.is_empty() {
                None
            } else {
                Some(self.filters.iter().copied().collect())
            },
        }
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
        verbose: bool,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<mpsc::Receiver<AdvertisementResult>, ScanError>> + Send + '_,
        >,
    >;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
        verbose: bool,
    ) -> Pin<
        Box<
            dyn Future<Output = Result<mpsc::Receiver<AdvertisementResult>, ScanError>> + Send + '_,
        >,
    > {
        Box::pin(async move { crate::scanner::start_scan(backend, verbose).await })
    }
}

/// Sink that renders registry events as output lines.
///
/// Update events pass through the throttle; membership events always print.
/// The first write failure is recorded and stops further output so the run
/// loop can surface it.
struct LineSink<'a> {
    out: &'a mut dyn Write,
    aliases: &'a AliasMap,
    throttle: &'a mut Option<Throttle>,
    failure: Option<io::Error>,
}

impl EventSink for LineSink<'_> {
    fn emit(&mut self, event: BeaconEvent) {
        if self.failure.is_some() {
            return;
        }
        if matches!(event, BeaconEvent::FieldChanged { .. })
            && let Some(throttle) = self.throttle.as_mut()
            && !throttle.should_emit(event.address())
        {
            return;
        }

        let name = crate::alias::resolve_name(&event.address(), self.aliases);
        if let Err(error) = writeln!(self.out, "{} {}", name, event.details()) {
            self.failure = Some(error);
        }
    }
}

/// Run the core processing loop, writing event lines to `out` and verbose
/// errors to `err`.
///
/// - Advertisements feed the registry; the resulting added/removed/update
///   events are printed one per line, with aliases applied to the address.
/// - Scanner errors are written to `err` only when `options.verbose` is true.
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let aliases: AliasMap = crate::alias::to_map(&options.aliases);
    let mut registry = BeaconRegistry::new(options.registry_config());

    // Create throttle if interval is specified
    let mut throttle = options.throttle.map(Throttle::new);

    let mut advertisements = scanner.start_scan(options.backend, options.verbose).await?;

    while let Some(result) = advertisements.recv().await {
        match result {
            Ok(advertisement) => {
                let mut sink = LineSink {
                    out: &mut *out,
                    aliases: &aliases,
                    throttle: &mut throttle,
                    failure: None,
                };
                registry.receive(&advertisement, &mut sink)?;
                if let Some(error) = sink.failure {
                    return Err(error.into());
                }
            }
            Err(scan_error) => {
                if options.verbose {
                    writeln!(err, "{scan_error}")?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BeaconAddress;
    use crate::test_utils::{
        TEST_ADDRESS, eddystone_advertisement, nearable_advertisement, nearable_payload,
        tlm_payload,
    };
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FakeScanner {
        results: Mutex<Vec<AdvertisementResult>>,
    }

    impl FakeScanner {
        fn new(results: Vec<AdvertisementResult>) -> Self {
            Self {
                results: Mutex::new(results),
            }
        }
    }

    impl Scanner for FakeScanner {
        fn start_scan(
            &self,
            _backend: Backend,
            _verbose: bool,
        ) -> Pin<
            Box<
                dyn Future<Output = Result<mpsc::Receiver<AdvertisementResult>, ScanError>>
                    + Send
                    + '_,
            >,
        > {
            let results = self.results.lock().unwrap().clone();
            Box::pin(async move {
                let (tx, rx) = mpsc::channel::<AdvertisementResult>(results.len().max(1));
                tokio::spawn(async move {
                    for r in results {
                        let _ = tx.send(r).await;
                    }
                    // drop tx to close channel
                });
                Ok(rx)
            })
        }
    }

    fn options() -> Options {
        Options {
            expiry: Duration::from_secs(10),
            filters: vec![],
            aliases: vec![],
            verbose: false,
            throttle: None,
            backend: Backend::Bluer,
        }
    }

    async fn run_to_strings(
        options: Options,
        results: Vec<AdvertisementResult>,
    ) -> (String, String) {
        let scanner = FakeScanner::new(results);
        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        run_with_io(options, &scanner, &mut out, &mut err)
            .await
            .unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[tokio::test]
    async fn run_prints_added_beacons() {
        let adv = eddystone_advertisement(TEST_ADDRESS, tlm_payload());
        let (out, err) = run_to_strings(options(), vec![Ok(adv)]).await;

        assert!(err.is_empty());
        assert_eq!(out, "AA:BB:CC:DD:EE:FF added type=EddystoneBeacon\n");
    }

    #[tokio::test]
    async fn run_prints_field_changes() {
        let still = nearable_advertisement(TEST_ADDRESS, nearable_payload(0x00));
        let moving = nearable_advertisement(TEST_ADDRESS, nearable_payload(0x40));

        let (out, _) = run_to_strings(options(), vec![Ok(still), Ok(moving)]).await;

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "AA:BB:CC:DD:EE:FF added type=EstimoteNearable");
        assert_eq!(
            lines[1],
            "AA:BB:CC:DD:EE:FF nearable-telemetry moving: false -> true"
        );
    }

    #[tokio::test]
    async fn run_applies_aliases() {
        let mut opts = options();
        opts.aliases = vec![crate::alias::parse_alias("AA:BB:CC:DD:EE:FF=Doorway").unwrap()];

        let adv = eddystone_advertisement(TEST_ADDRESS, tlm_payload());
        let (out, _) = run_to_strings(opts, vec![Ok(adv)]).await;

        assert_eq!(out, "Doorway added type=EddystoneBeacon\n");
    }

    #[tokio::test]
    async fn run_applies_type_filter() {
        let mut opts = options();
        opts.filters = vec![BeaconType::EstimoteNearable];

        let eddystone = eddystone_advertisement(TEST_ADDRESS, tlm_payload());
        let nearable = nearable_advertisement(
            BeaconAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            nearable_payload(0x00),
        );
        let (out, _) = run_to_strings(opts, vec![Ok(eddystone), Ok(nearable)]).await;

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "11:22:33:44:55:66 added type=EstimoteNearable");
    }

    #[tokio::test]
    async fn run_throttles_update_events() {
        let mut opts = options();
        opts.throttle = Some(Duration::from_secs(3600));

        let results = vec![
            Ok(nearable_advertisement(TEST_ADDRESS, nearable_payload(0x00))),
            Ok(nearable_advertisement(TEST_ADDRESS, nearable_payload(0x40))),
            Ok(nearable_advertisement(TEST_ADDRESS, nearable_payload(0x00))),
        ];
        let (out, _) = run_to_strings(opts, results).await;

        // Added always prints; only the first update passes the throttle
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("moving: false -> true"));
    }

    #[tokio::test]
    async fn run_prints_scan_errors_only_when_verbose() {
        let error = ScanError::Bluetooth("adapter gone".to_string());

        // non-verbose: nothing written
        let (out, err) = run_to_strings(options(), vec![Err(error.clone())]).await;
        assert!(out.is_empty());
        assert!(err.is_empty());

        // verbose: error is written to err
        let mut verbose = options();
        verbose.verbose = true;
        let (out, err) = run_to_strings(verbose, vec![Err(error)]).await;
        assert!(out.is_empty());
        assert!(err.contains("Bluetooth error: adapter gone"));
    }
}
