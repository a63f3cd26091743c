//! Capability Interfaces (spec §4.4): one module per interface, each
//! exposing `initialize`/`enable`/`disable` plus its domain operations
//! against a shared [`CapabilityContext`].
//!
//! Grounded on the teacher's `src/command/*` modules for which AT commands
//! each concern owns, and on `original_source`'s `mm-iface-modem*.c` family
//! for the initialize/enable/disable split itself (a pattern the teacher,
//! being a single always-on driver rather than a stateful daemon, doesn't
//! need). Interfaces are plain structs with inherent `async fn`s rather
//! than a shared trait object: nothing in the retrieved pack reaches for
//! `async-trait` or a boxed `dyn` interface, and `Simple::connect`'s own
//! sequencing (§4.4.6) calls each interface by its concrete type in a fixed
//! order anyway, so a trait object would buy nothing.

pub mod cdma;
pub mod firmware;
pub mod location;
pub mod messaging;
pub mod modem;
pub mod simple;
pub mod three_gpp;
pub mod time;
pub mod ussd;

use std::sync::Arc;

use crate::queue::CommandQueue;

/// The shared handle every Capability Interface operates through: one
/// port's Command Queue plus (for CDMA) an optional QCDM port's. Interfaces
/// never write `Modem.state` themselves (spec §3 "no other component may
/// write the State") — they return data for the Orchestrator to fold in.
#[derive(Clone)]
pub struct CapabilityContext {
    pub primary: Arc<CommandQueue>,
    pub qcdm: Option<Arc<CommandQueue>>,
}

impl CapabilityContext {
    pub fn new(primary: Arc<CommandQueue>, qcdm: Option<Arc<CommandQueue>>) -> Self {
        Self { primary, qcdm }
    }
}
