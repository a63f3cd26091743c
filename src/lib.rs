//! Host-side daemon core for discovering and driving cellular modems over
//! AT command dialects and the QCDM diagnostic protocol.
//!
//! This crate implements the CORE only: the per-port serial/QCDM I/O engine
//! (§4.1-4.3), the per-modem capability/initialization pipeline (§4.4-4.5),
//! and the plugin discovery/probing pipeline (§4.6). The remote IPC object
//! model, persistent configuration, logging transport and system-bus name
//! ownership are exposed as thin adapters on top (`remote`, `discovery`) but
//! their concrete wiring (which bus name to own, which files to read
//! configuration from) is left to the embedding binary.

pub mod at;
pub mod bearer;
pub mod capability;
pub mod charset;
pub mod config;
pub mod discovery;
pub mod error;
pub mod modem;
pub mod orchestrator;
pub mod pdu;
pub mod plugin;
pub mod port;
pub mod qcdm;
pub mod queue;
pub mod registration;
pub mod remote;
pub mod sim;
pub mod sms;
pub mod urc;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use modem::{Modem, State};
