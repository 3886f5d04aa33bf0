//! heartsync - two-person heart-rate synchronization dashboard
//!
//! Listens to a BPM broker, measures how closely two heart rates agree,
//! and turns that agreement into color, motion and harmony.

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use heartsync::audio::CpalBackend;
use heartsync::cli::Args;
use heartsync::dashboard::Dashboard;
use heartsync::transport::{Transport, TransportEvent};
use heartsync::visual::LogSink;

/// Longest the event loop blocks between timer checks
const MAX_WAIT_MS: u64 = 100;

/// How often the headless status line is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = args.load_config()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
            warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let sink = LogSink::new(config.spatial.default_separation_px);
    let backend = CpalBackend::new(args.create_recording_config());
    let mut dashboard = Dashboard::new(config.clone(), sink, backend);
    if let Some(names) = &args.names {
        dashboard = dashboard.with_names_file(names);
    }
    dashboard.start();

    if args.wants_audio() && !dashboard.enable_audio() {
        warn!("audio unavailable, continuing without sound");
    }

    let (transport, events) = Transport::spawn(config.transport.clone(), Arc::clone(&stop));
    info!(address = %config.transport.address, "waiting for readings (Ctrl-C to quit)");

    let started = Instant::now();
    let run_for = args.run_limit();
    let elapsed_ms = || started.elapsed().as_millis() as u64;
    let mut last_status = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            info!("duration reached");
            break;
        }

        let now = elapsed_ms();
        dashboard.advance_to(now);

        let wait_ms = dashboard
            .next_deadline()
            .map_or(MAX_WAIT_MS, |due| due.saturating_sub(now))
            .clamp(1, MAX_WAIT_MS);

        match events.recv_timeout(Duration::from_millis(wait_ms)) {
            Ok(event) => {
                dashboard.advance_to(elapsed_ms());
                match event {
                    TransportEvent::Connected => dashboard.set_connected(true),
                    TransportEvent::Disconnected => dashboard.set_connected(false),
                    TransportEvent::Error(message) => debug!(%message, "transport error"),
                    TransportEvent::Message(text) => {
                        // Malformed payloads are logged and dropped inside
                        let _ = dashboard.handle_message(&text);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("transport thread ended");
                break;
            }
        }

        if last_status.elapsed() >= STATUS_INTERVAL {
            info!(status = %dashboard.sink().snapshot(), "dashboard");
            last_status = Instant::now();
        }
    }

    dashboard.stop();
    transport.shutdown();
    if let Err(e) = dashboard.audio_mut().backend_mut().close() {
        warn!(error = %e, "audio shutdown failed");
    }

    info!("goodbye");
    Ok(())
}
