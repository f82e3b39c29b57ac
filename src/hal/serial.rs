//! RS-485 serial sink. The port API is blocking, so writes run on the
//! blocking thread pool; the dispatcher is the only caller, so the port
//! mutex is uncontended.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{info, warn};

use super::TransportError;
use crate::config::{Parity, SerialConfig};

type Port = Arc<Mutex<Option<Box<dyn SerialPort>>>>;

pub struct SerialSink {
    config: SerialConfig,
    port: Port,
}

impl SerialSink {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn open(&mut self) -> Result<(), TransportError> {
        let config = self.config.clone();
        let port = Arc::clone(&self.port);

        tokio::task::spawn_blocking(move || {
            let builder = serialport::new(&config.port, config.baud)
                .timeout(Duration::from_millis(500))
                .data_bits(match config.data_bits {
                    5 => serialport::DataBits::Five,
                    6 => serialport::DataBits::Six,
                    7 => serialport::DataBits::Seven,
                    _ => serialport::DataBits::Eight,
                })
                .stop_bits(if config.stop_bits == 2 {
                    serialport::StopBits::Two
                } else {
                    serialport::StopBits::One
                })
                .parity(match config.parity {
                    Parity::None => serialport::Parity::None,
                    Parity::Even => serialport::Parity::Even,
                    Parity::Odd => serialport::Parity::Odd,
                });

            match builder.open() {
                Ok(opened) => {
                    info!(port = %config.port, baud = config.baud, "serial port opened");
                    *port.lock().unwrap_or_else(|p| p.into_inner()) = Some(opened);
                    Ok(())
                }
                Err(e) => Err(TransportError::Permanent(format!(
                    "open {} failed: {e}",
                    config.port
                ))),
            }
        })
        .await
        .map_err(|e| TransportError::Transient(format!("blocking task failed: {e}")))?
    }

    pub async fn close(&mut self) {
        let port = Arc::clone(&self.port);
        let _ = tokio::task::spawn_blocking(move || {
            *port.lock().unwrap_or_else(|p| p.into_inner()) = None;
        })
        .await;
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = Arc::clone(&self.port);
        let buf = bytes.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock().unwrap_or_else(|p| p.into_inner());
            let Some(handle) = guard.as_mut() else {
                return Err(TransportError::Transient("serial port not open".into()));
            };

            match handle.write_all(&buf).and_then(|_| handle.flush()) {
                Ok(()) => Ok(()),
                Err(e) => Err(classify_io_error(e)),
            }
        })
        .await
        .map_err(|e| TransportError::Transient(format!("blocking task failed: {e}")))?
    }
}

/// Timeouts and interruptions are worth retrying next tick; a vanished or
/// broken device is not.
fn classify_io_error(e: std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {
            warn!(error = %e, "serial write timed out");
            TransportError::Transient(e.to_string())
        }
        _ => TransportError::Permanent(e.to_string()),
    }
}
