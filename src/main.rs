//! geoclue-position binary entry point.
//!
//! Replays a file of location readings through a simulated service and
//! prints every event of the position source as a JSON line on stdout.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use geoclue_position::cli::{self, Args};
use geoclue_position::client::MINIMUM_UPDATE_INTERVAL_MS;
use geoclue_position::config::Config;
use geoclue_position::{
    logging, ClientState, LocationReading, PositionSource, SimulatedProvider, SourceErrorKind,
    SourceEvent,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'geoclue-position --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let _ = logging::init_with_filter(config.log_filter());

    info!("geoclue-position v{}", env!("CARGO_PKG_VERSION"));

    match run(&args, &config).await {
        Ok(SourceErrorKind::NoError) => ExitCode::SUCCESS,
        Ok(kind) => {
            warn!("Position source reported {}", kind);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_readings(path: &Path) -> geoclue_position::Result<Vec<LocationReading>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn print_event(event: &SourceEvent) -> geoclue_position::Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

/// Drive one source until the replay is done, the request is answered, or
/// the process is interrupted. Returns the last reported error kind.
async fn run(args: &Args, config: &Config) -> geoclue_position::Result<SourceErrorKind> {
    let readings = match args.replay {
        Some(ref path) => load_readings(path)?,
        None => Vec::new(),
    };
    info!("Loaded {} readings to replay", readings.len());

    let provider = SimulatedProvider::new();
    let source = PositionSource::new(provider.clone(), config.to_source_options());
    let mut events = source.subscribe();

    let single_shot = args.timeout_ms.is_some();
    match args.timeout_ms {
        Some(timeout) => source.request_update(timeout),
        None => source.start_updates(),
    }

    let interval = Duration::from_millis(u64::from(
        config
            .client_settings()
            .update_interval_ms
            .max(MINIMUM_UPDATE_INTERVAL_MS),
    ));
    let mut feeder = {
        let provider = provider.clone();
        let mut watch = source.watch();
        tokio::spawn(async move {
            if watch
                .wait_for(|s| s.state == ClientState::Started)
                .await
                .is_err()
            {
                return;
            }
            for reading in readings {
                let delivered = provider.publish(reading);
                debug!("Published reading to {} client(s)", delivered);
                tokio::time::sleep(interval).await;
            }
        })
    };

    let mut replay_done = false;
    loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event)?;
                    if single_shot || matches!(event, SourceEvent::ErrorOccurred(_)) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Dropped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut feeder, if !replay_done => {
                replay_done = true;
                if !single_shot {
                    info!("Replay finished");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    feeder.abort();

    if !single_shot {
        source.stop_updates();
        let mut watch = source.watch();
        let _ = tokio::time::timeout(
            interval,
            watch.wait_for(|s| s.state == ClientState::NoSession),
        )
        .await;
        while let Ok(event) = events.try_recv() {
            print_event(&event)?;
        }
    }

    let result = source.error();
    source.shutdown().await;
    Ok(result)
}
