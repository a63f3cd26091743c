//! The Command Queue (spec §4.2): single-flight per-port command
//! scheduling, timeout/cache policy, and multi-command sequences.

mod cancel;
mod sequence;

pub use cancel::CancellationToken;
pub use sequence::{fold_step, ControlFlow, SequenceOutcome, SequenceStep};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::at::AtCommand;
use crate::error::{Error, Result};
use crate::port::{Dialect, Transport, TransportEvent, TransportHandle};
use crate::qcdm::QcdmCommand;
use crate::urc::UrcDispatcher;

/// The classification of a terminal response line (spec §4.2 "Response
/// classification").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Ok,
    Error,
    Cme(u16),
    Cms(u16),
    NoCarrier,
    NoAnswer,
    NoDialtone,
    Busy,
    Connect,
    CommandNotSupported,
    TooManyParameters,
}

impl Terminal {
    /// Recognizes one of the fixed terminal tokens (spec §4.2), or `None`
    /// if `line` is an intermediate response frame.
    fn classify(line: &str) -> Option<Terminal> {
        let trimmed = line.trim();
        if trimmed == "OK" {
            return Some(Terminal::Ok);
        }
        if trimmed == "ERROR" {
            return Some(Terminal::Error);
        }
        if trimmed == "NO CARRIER" {
            return Some(Terminal::NoCarrier);
        }
        if trimmed == "NO ANSWER" {
            return Some(Terminal::NoAnswer);
        }
        if trimmed == "NO DIALTONE" {
            return Some(Terminal::NoDialtone);
        }
        if trimmed == "BUSY" {
            return Some(Terminal::Busy);
        }
        if trimmed.starts_with("CONNECT") {
            return Some(Terminal::Connect);
        }
        if trimmed == "COMMAND NOT SUPPORT" {
            return Some(Terminal::CommandNotSupported);
        }
        if trimmed == "TOO MANY PARAMETERS" {
            return Some(Terminal::TooManyParameters);
        }
        if let Some(rest) = trimmed.strip_prefix("+CME ERROR:") {
            return rest.trim().parse().ok().map(Terminal::Cme);
        }
        if let Some(rest) = trimmed.strip_prefix("+CMS ERROR:") {
            return rest.trim().parse().ok().map(Terminal::Cms);
        }
        None
    }

    /// Folds a terminal token plus its accumulated response body into the
    /// `Error` taxonomy, or `Ok(())` for success (spec §4.2, §7).
    fn into_result(self) -> Result<()> {
        match self {
            Terminal::Ok | Terminal::Connect => Ok(()),
            Terminal::Error => Err(Error::Other("ERROR".into())),
            Terminal::Cme(code) => Err(Error::CmeError(code)),
            Terminal::Cms(code) => Err(Error::CmsError(code)),
            Terminal::CommandNotSupported => Err(Error::NotSupported),
            Terminal::NoCarrier | Terminal::NoAnswer | Terminal::NoDialtone | Terminal::Busy => {
                Err(Error::Connected)
            }
            Terminal::TooManyParameters => Err(Error::ParseError("too many parameters".into())),
        }
    }
}

/// The raw (un-typed) outcome of one command exchange: the intermediate
/// lines gathered before the terminal token, plus that token.
#[derive(Debug, Clone)]
pub struct RawOutcome {
    pub lines: Vec<String>,
    pub terminal: Terminal,
}

/// What a pending command puts on the wire: an AT command line, an
/// already-encoded QCDM frame (opcode + payload, byte-stuffed, CRC'd), or
/// an AT command whose body is written separately once the modem's `>`
/// prompt arrives (`+CMGS`, spec §4.4.4 "Send-SMS" — the one exchange that
/// is genuinely two writes sharing a single terminal outcome).
enum Payload {
    At(String),
    Qcdm(Vec<u8>),
    AtWithBody { header: String, body_with_ctrlz: Vec<u8> },
}

/// What comes back: the AT terminal-classified outcome, or the raw QCDM
/// response frame (opcode byte still attached, split by the caller).
enum Outcome {
    At(RawOutcome),
    Qcdm(Vec<u8>),
}

struct PendingCommand {
    payload: Payload,
    cache_key: Option<String>,
    timeout: Duration,
    cancel: Option<CancellationToken>,
    done: oneshot::Sender<Result<Outcome>>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, RawOutcome>,
}

/// Owns one port's Serial Transport, runs the single-flight scheduling
/// loop, and routes URCs it declines to the port's [`UrcDispatcher`].
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<PendingCommand>,
    consecutive_timeouts: Arc<std::sync::atomic::AtomicU32>,
    max_timeouts: u32,
    cache: Arc<Mutex<CacheState>>,
    dialect: Dialect,
}

impl CommandQueue {
    /// Spawns the run loop driving `transport`, returning a handle plus the
    /// join handle of the background task (for orderly shutdown). `dialect`
    /// must match the port's own: it decides whether `run_one` frames a
    /// command as an `AT...\r\n` line with a terminal token, or as a single
    /// pre-encoded QCDM frame whose one reply frame is the whole response.
    pub fn spawn(
        mut transport: Transport,
        urc: UrcDispatcher,
        max_timeouts: u32,
        dialect: Dialect,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PendingCommand>();
        let handle = transport.handle();
        let consecutive_timeouts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let ct = consecutive_timeouts.clone();

        let join = tokio::spawn(async move {
            loop {
                // Idle: any frame that arrives before a command is written is
                // routed to the URC Dispatcher (spec §4.2, §5 ordering
                // guarantees); a new pending command ends the idle wait.
                let pending = loop {
                    tokio::select! {
                        biased;
                        pending = rx.recv() => break pending,
                        event = transport.recv() => {
                            match event {
                                Some(TransportEvent::Frame(bytes)) => {
                                    let line = String::from_utf8_lossy(&bytes).to_string();
                                    urc.dispatch(&line);
                                }
                                Some(TransportEvent::Gone) | None => break None,
                            }
                        }
                    }
                };

                match pending {
                    Some(pending) => run_one(&mut transport, &handle, &urc, pending, &ct).await,
                    None => break,
                }
            }
        });

        (
            Self {
                tx,
                consecutive_timeouts,
                max_timeouts,
                cache: Arc::new(Mutex::new(CacheState::default())),
                dialect,
            },
            join,
        )
    }

    /// Consecutive timeouts observed on this port since the last success
    /// (spec §4.2); the Orchestrator fails the modem once this reaches
    /// `max_timeouts`.
    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
            .load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn has_failed(&self) -> bool {
        self.consecutive_timeouts() >= self.max_timeouts
    }

    /// Runs `cmd`, returning its typed response (spec §4.2 `enqueue`).
    pub async fn enqueue<C: AtCommand>(&self, cmd: &C) -> Result<C::Response> {
        let raw = self
            .enqueue_raw(Payload::At(cmd.command_text()), None, cmd.timeout(), None)
            .await?;
        let raw = expect_at(raw)?;
        raw.terminal.into_result()?;
        cmd.parse(&raw.lines)
    }

    /// Like [`Self::enqueue`] but cancellable (spec §5 "Cancellation").
    /// Cancelling before the command is written produces exactly zero bytes
    /// on the wire (I7); cancelling after leaves the in-flight exchange
    /// running and discards its eventual response.
    pub async fn enqueue_cancellable<C: AtCommand>(
        &self,
        cmd: &C,
        cancel: CancellationToken,
    ) -> Result<C::Response> {
        let raw = self
            .enqueue_raw(Payload::At(cmd.command_text()), None, cmd.timeout(), Some(cancel))
            .await?;
        let raw = expect_at(raw)?;
        raw.terminal.into_result()?;
        cmd.parse(&raw.lines)
    }

    /// Like [`Self::enqueue`] but memoizes successful terminal results by
    /// `cmd.cache_key()` (spec §4.2 `enqueue_cached`). Only used for
    /// commands that declare a cache key; panics in debug builds if not
    /// (programmer error — the caller picked the wrong method).
    pub async fn enqueue_cached<C: AtCommand>(&self, cmd: &C) -> Result<C::Response> {
        let key = cmd
            .cache_key()
            .expect("enqueue_cached called on a command with no cache_key");

        if let Some(cached) = self.cache.lock().unwrap().entries.get(&key).cloned() {
            return cmd.parse(&cached.lines);
        }

        let raw = self
            .enqueue_raw(
                Payload::At(cmd.command_text()),
                Some(key.clone()),
                cmd.timeout(),
                None,
            )
            .await?;
        let raw = expect_at(raw)?;
        raw.terminal.clone().into_result()?;
        let parsed = cmd.parse(&raw.lines)?;
        self.cache.lock().unwrap().entries.insert(key, raw);
        Ok(parsed)
    }

    /// Runs a QCDM command on a queue driving a Qcdm-dialect port (spec
    /// §4.4.3, §6). Single-flight scheduling and per-command timeout work
    /// exactly as they do for AT commands; there's no terminal-token
    /// classification to do, since one reply frame is the whole response.
    pub async fn enqueue_qcdm<C: QcdmCommand>(&self, cmd: &C) -> Result<C::Response> {
        debug_assert_eq!(self.dialect, Dialect::Qcdm, "enqueue_qcdm used on a non-Qcdm queue");
        let frame = self
            .enqueue_raw(Payload::Qcdm(cmd.encode()), None, cmd.timeout(), None)
            .await?;
        let frame = match frame {
            Outcome::Qcdm(bytes) => bytes,
            Outcome::At(_) => return Err(Error::Other("expected a QCDM frame, got an AT outcome".into())),
        };
        let (_opcode, payload) = crate::qcdm::decode_frame(&frame)?;
        cmd.parse(&payload)
    }

    /// Runs a `CommandSequence` (spec §3, §4.2): an ordered list of steps
    /// sharing one completion sink. Each step is awaited in turn and its
    /// outcome folded through [`fold_step`]; the first `Done` wins, and an
    /// empty sequence is a programmer error (there is nothing to complete
    /// the sink with).
    pub async fn enqueue_sequence<T>(
        &self,
        steps: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = SequenceStep<T>> + Send + '_>>>,
    ) -> SequenceOutcome<T> {
        let last = steps.len().saturating_sub(1);
        for (i, step) in steps.into_iter().enumerate() {
            match fold_step(step.await, i == last) {
                ControlFlow::Continue => continue,
                ControlFlow::Done(result) => return result,
            }
        }
        Err(Error::Other("enqueue_sequence called with no steps".into()))
    }

    /// Runs `+CMGS`'s two-phase exchange (spec §4.4.4 "Send-SMS"): writes
    /// `header` (e.g. `+CMGS=<len>`), waits for the modem's `>` prompt, then
    /// writes the PDU hex followed by Ctrl-Z, and resolves with the same
    /// terminal token a plain command would. `pdu_hex` is ASCII already, so
    /// it's written as-is rather than re-encoded.
    pub async fn enqueue_sms_submit(&self, header: &str, pdu_hex: &str) -> Result<()> {
        let mut body_with_ctrlz = pdu_hex.as_bytes().to_vec();
        body_with_ctrlz.push(0x1A);
        let raw = self
            .enqueue_raw(
                Payload::AtWithBody {
                    header: header.to_string(),
                    body_with_ctrlz,
                },
                None,
                Duration::from_secs(30),
                None,
            )
            .await?;
        let raw = expect_at(raw)?;
        raw.terminal.into_result()
    }

    async fn enqueue_raw(
        &self,
        payload: Payload,
        cache_key: Option<String>,
        timeout: Duration,
        cancel: Option<CancellationToken>,
    ) -> Result<Outcome> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(PendingCommand {
                payload,
                cache_key,
                timeout,
                cancel,
                done: done_tx,
            })
            .map_err(|_| Error::PortClosed)?;
        done_rx.await.map_err(|_| Error::Cancelled)?
    }
}

fn expect_at(outcome: Outcome) -> Result<RawOutcome> {
    match outcome {
        Outcome::At(raw) => Ok(raw),
        Outcome::Qcdm(_) => Err(Error::Other("expected an AT outcome, got a QCDM frame".into())),
    }
}

async fn run_one(
    transport: &mut Transport,
    handle: &TransportHandle,
    urc: &UrcDispatcher,
    pending: PendingCommand,
    consecutive_timeouts: &Arc<std::sync::atomic::AtomicU32>,
) {
    let PendingCommand {
        payload,
        timeout,
        cancel,
        done,
        ..
    } = pending;

    if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
        // I7: cancelled before being written produces zero bytes on the wire.
        let _ = done.send(Err(Error::Cancelled));
        return;
    }

    let bytes = match &payload {
        Payload::At(text) => format!("AT{text}\r\n").into_bytes(),
        Payload::Qcdm(frame) => frame.clone(),
        Payload::AtWithBody { header, .. } => format!("AT{header}\r\n").into_bytes(),
    };
    if let Err(e) = handle.write(bytes) {
        let _ = done.send(Err(e));
        return;
    }

    let mut lines = Vec::new();
    let outcome = tokio::time::timeout(timeout, async {
        loop {
            match transport.recv().await {
                Some(TransportEvent::Frame(bytes)) => match &payload {
                    Payload::Qcdm(_) => return Ok(Outcome::Qcdm(bytes)),
                    Payload::At(_) => {
                        let line = String::from_utf8_lossy(&bytes).to_string();
                        if let Some(terminal) = Terminal::classify(&line) {
                            return Ok(Outcome::At(RawOutcome {
                                lines: std::mem::take(&mut lines),
                                terminal,
                            }));
                        }
                        // A URC can arrive while a command is in-flight (spec
                        // §4.2, I2); give the Dispatcher first refusal before
                        // treating the frame as part of this command's body.
                        if !urc.dispatch(&line) {
                            lines.push(line);
                        }
                    }
                    Payload::AtWithBody { body_with_ctrlz, .. } => {
                        let line = String::from_utf8_lossy(&bytes).to_string();
                        if let Some(terminal) = Terminal::classify(&line) {
                            return Ok(Outcome::At(RawOutcome {
                                lines: std::mem::take(&mut lines),
                                terminal,
                            }));
                        }
                        if line.trim_start().starts_with('>') {
                            handle.write(body_with_ctrlz.clone())?;
                            continue;
                        }
                        if !urc.dispatch(&line) {
                            lines.push(line);
                        }
                    }
                },
                Some(TransportEvent::Gone) => return Err(Error::PortClosed),
                None => return Err(Error::PortClosed),
            }
        }
    })
    .await;

    match outcome {
        Ok(result) => {
            match &result {
                Ok(_) => consecutive_timeouts.store(0, std::sync::atomic::Ordering::Release),
                Err(_) => {
                    consecutive_timeouts.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
                }
            }
            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                // Cancelled after being written: the exchange already ran on the
                // wire, so its response is discarded rather than aborted (spec §5).
                let _ = done.send(Err(Error::Cancelled));
            } else {
                let _ = done.send(result);
            }
        }
        Err(_elapsed) => {
            consecutive_timeouts.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
            let _ = done.send(Err(Error::Timeout));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_terminal_tokens() {
        assert_eq!(Terminal::classify("OK"), Some(Terminal::Ok));
        assert_eq!(Terminal::classify("ERROR"), Some(Terminal::Error));
        assert_eq!(Terminal::classify("+CME ERROR: 10"), Some(Terminal::Cme(10)));
        assert_eq!(Terminal::classify("+CMS ERROR: 500"), Some(Terminal::Cms(500)));
        assert_eq!(Terminal::classify("NO CARRIER"), Some(Terminal::NoCarrier));
        assert_eq!(Terminal::classify("+CREG: 1,2"), None);
    }

    #[test]
    fn b4_error_with_no_code_is_generic_not_a_crash() {
        let r = Terminal::Error.into_result();
        assert!(r.is_err());
    }
}
