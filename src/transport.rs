//! Reading stream from the broker.
//!
//! A background thread holds a TCP connection, splits it into
//! newline-delimited JSON payloads and forwards them, together with
//! connection lifecycle events, over a channel. Payloads are not parsed
//! here; the dashboard does that on its own thread. After any failure the
//! thread waits a fixed delay and reconnects.

use crossbeam_channel::{Receiver, Sender};
use std::io::{self, BufRead, BufReader};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::params::TransportParams;

/// What the transport thread reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// Connection or read failure; a reconnect follows
    Error(String),
    /// One raw payload line
    Message(String),
}

/// Why a connection ended
enum Ended {
    /// Peer closed the stream
    Closed,
    Failed(io::Error),
    /// Stop flag set or receiver dropped
    Shutdown,
}

/// Running transport thread
pub struct Transport {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Transport {
    /// Start connecting in the background
    ///
    /// The thread exits once `stop` is set or the receiver is dropped.
    pub fn spawn(params: TransportParams, stop: Arc<AtomicBool>) -> (Self, Receiver<TransportEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("transport".to_string())
            .spawn(move || run(params, tx, flag))
            .map_err(|e| warn!(error = %e, "transport thread failed to start"))
            .ok();

        (Self { stop, thread }, rx)
    }

    /// Signal the thread and wait for it
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("transport thread panicked");
            }
        }
    }
}

fn run(params: TransportParams, tx: Sender<TransportEvent>, stop: Arc<AtomicBool>) {
    let read_timeout = Duration::from_millis(params.read_timeout_ms.max(1));
    let reconnect_delay = Duration::from_millis(params.reconnect_delay_ms);

    while !stop.load(Ordering::SeqCst) {
        match TcpStream::connect(&params.address) {
            Ok(stream) => {
                info!(address = %params.address, "connected to broker");
                if tx.send(TransportEvent::Connected).is_err() {
                    return;
                }

                let ended = match stream.set_read_timeout(Some(read_timeout)) {
                    Ok(()) => read_lines(stream, &tx, &stop),
                    Err(e) => Ended::Failed(e),
                };

                match ended {
                    Ended::Shutdown => return,
                    Ended::Closed => info!("broker closed the connection"),
                    Ended::Failed(e) => {
                        warn!(error = %e, "connection lost");
                        if tx.send(TransportEvent::Error(e.to_string())).is_err() {
                            return;
                        }
                    }
                }
                if tx.send(TransportEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(
                    address = %params.address,
                    error = %e,
                    retry_ms = params.reconnect_delay_ms,
                    "unable to connect"
                );
                if tx.send(TransportEvent::Error(e.to_string())).is_err() {
                    return;
                }
            }
        }

        wait_or_stop(reconnect_delay, &stop);
    }
    debug!("transport stopped");
}

fn read_lines(stream: TcpStream, tx: &Sender<TransportEvent>, stop: &AtomicBool) -> Ended {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        if stop.load(Ordering::SeqCst) {
            return Ended::Shutdown;
        }

        match reader.read_line(&mut line) {
            Ok(0) => return Ended::Closed,
            Ok(_) => {
                let payload = line.trim();
                if !payload.is_empty() && tx.send(TransportEvent::Message(payload.to_string())).is_err() {
                    return Ended::Shutdown;
                }
                line.clear();
            }
            // Poll the stop flag; a partial line stays buffered
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => return Ended::Failed(e),
        }
    }
}

/// Sleep in short slices so a stop request is honored promptly
fn wait_or_stop(delay: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + delay;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}
