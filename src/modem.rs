//! The Modem data model (spec §3 `Modem`, `State`).

use std::collections::HashMap;

use crate::bearer::BearerList;
use crate::charset::Charset;
use crate::port::{Port, PortId};
use crate::registration::DomainRegistration;
use crate::sim::Sim;

/// spec §3 `State`: transitions are triggered only by Orchestrator steps
/// or explicit failure events; no other component may write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum State {
    Failed,
    Unknown,
    Initializing,
    Locked,
    Disabled,
    Disabling,
    Enabling,
    Enabled,
    Searching,
    Registered,
    Disconnecting,
    Connecting,
    Connected,
}

impl Default for State {
    fn default() -> Self {
        State::Unknown
    }
}

/// spec §3 Modem "capability bitset (GSM-UMTS | CDMA-EVDO | LTE | IRIDIUM)".
/// Hand-rolled rather than via the `bitflags` crate (no example in the
/// retrieved pack depends on it; see DESIGN.md).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CapabilityBits(u8);

impl CapabilityBits {
    pub const GSM_UMTS: CapabilityBits = CapabilityBits(1 << 0);
    pub const CDMA_EVDO: CapabilityBits = CapabilityBits(1 << 1);
    pub const LTE: CapabilityBits = CapabilityBits(1 << 2);
    pub const IRIDIUM: CapabilityBits = CapabilityBits(1 << 3);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, flag: CapabilityBits) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn insert(&mut self, flag: CapabilityBits) {
        self.0 |= flag.0;
    }

    pub fn is_cdma_only(self) -> bool {
        self.contains(CapabilityBits::CDMA_EVDO) && !self.contains(CapabilityBits::GSM_UMTS) && !self.contains(CapabilityBits::LTE)
    }
}

impl std::ops::BitOr for CapabilityBits {
    type Output = CapabilityBits;

    fn bitor(self, rhs: Self) -> Self::Output {
        CapabilityBits(self.0 | rhs.0)
    }
}

/// spec §3 `Modem`.
pub struct Modem {
    pub device_path: String,
    pub ports: HashMap<PortId, Port>,
    pub sim: Option<Sim>,
    pub bearers: BearerList,
    pub state: State,
    pub capabilities: CapabilityBits,
    pub current_charset: Charset,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub drivers: Vec<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
    /// IMEI (3GPP) or ESN (CDMA) — spec §4.4.1 "equipment identifier
    /// (IMEI/ESN)".
    pub equipment_identifier: Option<String>,
    /// A stable hash derived from `ATI`/`ATI1` and IDs (spec §4.4.1
    /// "device-identifier").
    pub device_identifier: Option<String>,
    pub own_numbers: Vec<String>,
    pub unlock_retries: crate::at::device_lock::PinRetries,
    /// Aggregate CS/PS/EPS registration state, updated as `+CxREG` reports
    /// and URCs arrive (spec §4.4.2; written only by the Orchestrator's URC
    /// handlers and `ThreeGppCapability::check_registration`).
    pub registration: DomainRegistration,
}

impl Modem {
    pub fn new(device_path: String) -> Self {
        Self {
            device_path,
            ports: HashMap::new(),
            sim: None,
            bearers: BearerList::new(),
            state: State::Unknown,
            capabilities: CapabilityBits::empty(),
            current_charset: Charset::Unknown,
            vendor_id: None,
            product_id: None,
            drivers: Vec::new(),
            manufacturer: None,
            model: None,
            revision: None,
            equipment_identifier: None,
            device_identifier: None,
            own_numbers: Vec::new(),
            unlock_retries: crate::at::device_lock::PinRetries::default(),
            registration: DomainRegistration::default(),
        }
    }

    /// Derives a stable device identifier hash from the identification
    /// banner and IDs collected during `Modem::initialize` (spec §4.4.1).
    pub fn compute_device_identifier(ati: &str, equipment_identifier: Option<&str>) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        ati.hash(&mut hasher);
        equipment_identifier.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Invariant I4: at most one Primary AT port at any time.
    pub fn assert_single_primary(&self) {
        let ports: Vec<_> = self.ports.values().cloned().collect();
        assert!(
            crate::port::assert_single_primary(&ports),
            "more than one Primary port on {}",
            self.device_path
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdma_only_capability_detection() {
        let mut caps = CapabilityBits::empty();
        caps.insert(CapabilityBits::CDMA_EVDO);
        assert!(caps.is_cdma_only());
        caps.insert(CapabilityBits::LTE);
        assert!(!caps.is_cdma_only());
    }

    #[test]
    fn device_identifier_is_stable_for_same_inputs() {
        let a = Modem::compute_device_identifier("Manufacturer Model Rev1", Some("123456789012345"));
        let b = Modem::compute_device_identifier("Manufacturer Model Rev1", Some("123456789012345"));
        assert_eq!(a, b);
    }

    #[test]
    fn device_identifier_differs_for_different_equipment_ids() {
        let a = Modem::compute_device_identifier("Manufacturer Model Rev1", Some("111111111111111"));
        let b = Modem::compute_device_identifier("Manufacturer Model Rev1", Some("222222222222222"));
        assert_ne!(a, b);
    }

    #[test]
    fn new_modem_starts_unknown() {
        let m = Modem::new("/sys/devices/foo".into());
        assert_eq!(m.state, State::Unknown);
    }
}
