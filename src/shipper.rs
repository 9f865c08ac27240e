// Network log shipping sink
// Sends JSON lines over TCP from a dedicated worker thread, reconnecting with
// exponential backoff when the connection drops.

use crate::error::SinkError;
use crate::format::{json_object, write_json_line};
use crate::sink::{Record, Sink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_SHIPPER_PORT: &str = "5000";
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const RECONNECT_DELAY_MULTIPLIER: u32 = 2;
pub const MAX_RECONNECT_RETRIES: u32 = 10;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);
const FLUSH_RETRY_INTERVAL: Duration = Duration::from_millis(10);
const DROP_WARN_EVERY: u64 = 1024;

fn default_shipper_port() -> String {
    DEFAULT_SHIPPER_PORT.to_string()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Destination of the shipping sink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShipperConfig {
    pub host: String,

    #[serde(default = "default_shipper_port")]
    pub port: String,

    /// Records buffered while the worker is busy. Once full, new records
    /// are dropped instead of blocking the caller.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl ShipperConfig {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        ShipperConfig {
            host: host.into(),
            port: port.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// `host:port`, with the default port when the configured one is blank.
    pub fn address(&self) -> String {
        let port = self.port.trim();
        let port = if port.is_empty() {
            DEFAULT_SHIPPER_PORT
        } else {
            port
        };
        format!("{}:{}", self.host.trim(), port)
    }
}

/// Connection timeout and the backoff schedule used after the connection is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_retries: u32,
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base_delay: RECONNECT_BASE_DELAY,
            multiplier: RECONNECT_DELAY_MULTIPLIER,
            max_retries: MAX_RECONNECT_RETRIES,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1).min(31));
        self.base_delay.saturating_mul(factor)
    }
}

enum Command {
    Line(Vec<u8>),
    Flush(std_mpsc::Sender<()>),
}

/// Ships records to a TCP endpoint as JSON lines tagged with `type`.
pub struct ShipperSink {
    tx: mpsc::Sender<Command>,
    app_name: String,
    address: String,
    dropped: AtomicU64,
}

impl ShipperSink {
    /// Dial `config` and start the worker. Fails if the first connection
    /// cannot be made within [`CONNECT_TIMEOUT`].
    pub fn connect(config: &ShipperConfig, app_name: &str) -> Result<Self, SinkError> {
        Self::connect_with(config, app_name, ReconnectPolicy::default())
    }

    pub fn connect_with(
        config: &ShipperConfig,
        app_name: &str,
        policy: ReconnectPolicy,
    ) -> Result<Self, SinkError> {
        let address = config.address();
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let worker_address = address.clone();
        std::thread::Builder::new()
            .name("structlog-shipper".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(SinkError::Runtime(e)));
                        return;
                    }
                };

                runtime.block_on(async move {
                    match dial(&worker_address, policy.connect_timeout).await {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            run_worker(stream, rx, &worker_address, policy).await;
                        }
                        Err(source) => {
                            let _ = ready_tx.send(Err(SinkError::Connect {
                                address: worker_address.clone(),
                                source,
                            }));
                        }
                    }
                });
            })
            .map_err(SinkError::Runtime)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(SinkError::Runtime(std::io::Error::other(
                    "shipper worker exited during startup",
                )));
            }
        }

        tracing::debug!(address = %address, "Log shipper connected");

        Ok(ShipperSink {
            tx,
            app_name: app_name.to_string(),
            address,
            dropped: AtomicU64::new(0),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// False once the worker has given up reconnecting.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Records dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Sink for ShipperSink {
    fn write(&self, record: &Record<'_>) {
        let mut object = json_object(record);
        object.insert("type".to_string(), Value::String(self.app_name.clone()));

        let mut line = Vec::with_capacity(256);
        write_json_line(object, &mut line);

        match self.tx.try_send(Command::Line(line)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % DROP_WARN_EVERY == 0 {
                    tracing::warn!(
                        address = %self.address,
                        dropped,
                        "Log shipper queue full, dropping records"
                    );
                }
            }
            // The worker gave up; the record is dropped.
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn flush(&self) {
        let deadline = Instant::now() + FLUSH_TIMEOUT;
        let (done_tx, done_rx) = std_mpsc::channel();
        let mut command = Command::Flush(done_tx);

        loop {
            match self.tx.try_send(command) {
                Ok(()) => break,
                Err(TrySendError::Full(pending)) if Instant::now() < deadline => {
                    command = pending;
                    std::thread::sleep(FLUSH_RETRY_INTERVAL);
                }
                Err(_) => return,
            }
        }

        let _ = done_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()));
    }
}

async fn dial(address: &str, timeout: Duration) -> std::io::Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("connect timed out after {}ms", timeout.as_millis()),
        )),
    }
}

async fn run_worker(
    mut stream: TcpStream,
    mut rx: mpsc::Receiver<Command>,
    address: &str,
    policy: ReconnectPolicy,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Line(line) => {
                if let Err(e) = stream.write_all(&line).await {
                    tracing::warn!(address = %address, error = %e, "Log shipper connection lost");

                    match reconnect(address, policy).await {
                        Some(fresh) => {
                            stream = fresh;
                            let _ = stream.write_all(&line).await;
                        }
                        None => {
                            tracing::warn!(
                                address = %address,
                                retries = policy.max_retries,
                                "Log shipper giving up, further records are dropped"
                            );
                            return;
                        }
                    }
                }
            }
            Command::Flush(done) => {
                let _ = stream.flush().await;
                let _ = done.send(());
            }
        }
    }
}

async fn reconnect(address: &str, policy: ReconnectPolicy) -> Option<TcpStream> {
    for attempt in 1..=policy.max_retries {
        let delay = policy.delay(attempt);
        tracing::debug!(
            address = %address,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to log shipper"
        );
        tokio::time::sleep(delay).await;

        match dial(address, policy.connect_timeout).await {
            Ok(stream) => return Some(stream),
            Err(e) => {
                tracing::debug!(address = %address, attempt, error = %e, "Reconnect failed")
            }
        }
    }
    None
}
