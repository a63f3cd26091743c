//! The Serial Transport (spec §4.1): owns a device handle, configures line
//! parameters once at open, and turns reads into framed [`TransportEvent`]s.
//!
//! Grounded on the teacher's own `examples/tokio-std-example`, which opens a
//! real TTY with `tokio_serial::SerialStream`; here the stream is driven
//! directly through `tokio::io::{AsyncRead, AsyncWrite}` rather than layered
//! under an AT-framework client, since the Command Queue above it is
//! hand-rolled rather than built on one (see DESIGN.md).

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

use crate::error::{Error, Result};
use crate::port::framer::{AtFramer, Dialect, HdlcFramer};

#[derive(Debug, Clone, Copy)]
pub struct OpenParams {
    pub baud_rate: u32,
    pub dialect: Dialect,
}

impl Default for OpenParams {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            dialect: Dialect::At,
        }
    }
}

/// A frame delivered by the transport, or the terminal `Gone` event (spec
/// §4.1 "persistent read errors ... surface a PortGone event").
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Frame(Vec<u8>),
    Gone,
}

/// An opaque handle to an open port. Cloning shares the same underlying
/// writer; closing any clone closes the transport (idempotent, per §4.1).
#[derive(Clone)]
pub struct TransportHandle {
    writer: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl TransportHandle {
    /// Write the entire buffer; the transport retries partial writes
    /// internally so callers never see a short write (spec §4.1).
    pub fn write(&self, bytes: Vec<u8>) -> Result<()> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(Error::PortClosed);
        }
        self.writer.send(bytes).map_err(|_| Error::PortClosed)
    }

    pub fn close(&self) {
        self.closed
            .store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::Acquire)
    }
}

/// Owns the device, its framer, and the read/write tasks driving it.
pub struct Transport {
    handle: TransportHandle,
    events: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
}

impl Transport {
    /// Opens `path` with `params`, spawning the tasks that pump bytes in
    /// and out. Framed output arrives through [`Transport::recv`].
    pub async fn open(path: &str, params: OpenParams) -> Result<Self> {
        let port = tokio_serial::new(path, params.baud_rate)
            .timeout(Duration::from_millis(10))
            .open_native_async()
            .map_err(|e| match e.kind {
                tokio_serial::ErrorKind::NoDevice => Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    e.to_string(),
                )),
                _ => Error::Serial(e),
            })?;

        let (mut reader, mut writer) = tokio::io::split(port);

        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
        let (evt_tx, evt_rx) = tokio::sync::mpsc::unbounded_channel::<TransportEvent>();

        let closed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let closed_writer = closed.clone();

        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                if closed_writer.load(std::sync::atomic::Ordering::Acquire) {
                    break;
                }
                if let Err(e) = writer.write_all(&bytes).await {
                    tracing::warn!(error = %e, "transport write failed");
                    break;
                }
                let _ = writer.flush().await;
            }
        });

        let closed_reader = closed.clone();
        let dialect = params.dialect;
        tokio::spawn(async move {
            let mut at_framer = AtFramer::new();
            let mut hdlc_framer = HdlcFramer::new();
            let mut buf = [0u8; 4096];
            loop {
                if closed_reader.load(std::sync::atomic::Ordering::Acquire) {
                    break;
                }
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        let _ = evt_tx.send(TransportEvent::Gone);
                        break;
                    }
                    Ok(n) => {
                        let frames = match dialect {
                            Dialect::At => at_framer.feed(&buf[..n]),
                            Dialect::Qcdm => hdlc_framer.feed(&buf[..n]),
                        };
                        for frame in frames {
                            if evt_tx.send(TransportEvent::Frame(frame)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "transport read failed, surfacing PortGone");
                        let _ = evt_tx.send(TransportEvent::Gone);
                        break;
                    }
                }
            }
            closed_reader.store(true, std::sync::atomic::Ordering::Release);
        });

        let handle = TransportHandle {
            writer: out_tx,
            closed,
        };

        Ok(Self {
            handle,
            events: evt_rx,
        })
    }

    pub fn handle(&self) -> TransportHandle {
        self.handle.clone()
    }

    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Drops DTR for `duration` then raises it again (spec §4.1 `flash`),
    /// needed by some modems before init.
    pub async fn flash(path: &str, duration: Duration) -> Result<()> {
        let mut port = tokio_serial::new(path, 115_200)
            .open_native_async()
            .map_err(Error::Serial)?;
        port.write_data_terminal_ready(false)
            .map_err(Error::Serial)?;
        tokio::time::sleep(duration).await;
        port.write_data_terminal_ready(true).map_err(Error::Serial)?;
        Ok(())
    }

    pub fn close(&self) {
        self.handle.close();
    }
}
