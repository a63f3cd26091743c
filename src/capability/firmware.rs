//! Firmware capability: identification only (firmware *flashing* and the
//! vendor image-slot listing are Non-goals). Grounded on
//! `original_source`'s `mm-iface-modem-firmware.c`, reduced to the
//! `+CGMR` revision string shared with [`crate::capability::modem::ModemCapability`].
//!
//! This is the interface the Orchestrator's Locked-state branch runs
//! without unlocking the SIM first (spec §4.5 "If state moved to Locked,
//! skip to Firmware-interface init") — `+CGMR` needs no PIN.

use crate::at::mobile_control::QueryRevision;
use crate::capability::CapabilityContext;

pub struct FirmwareCapability {
    ctx: CapabilityContext,
}

impl FirmwareCapability {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self { ctx }
    }

    /// spec §4.5 step 5 "Firmware-interface init" — runs even while Locked.
    pub async fn initialize(&self) -> Option<String> {
        self.ctx.primary.enqueue_cached(&QueryRevision).await.ok()
    }
}
