//! Port identity, classification and the Serial Transport (spec §3, §4.1).

pub(crate) mod framer;
mod transport;

pub use framer::{AtFramer, Dialect, HdlcFramer};
pub use transport::{OpenParams, Transport, TransportEvent, TransportHandle};

use std::collections::HashMap;

/// `(subsystem, name)` identity of a kernel device node (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortId {
    pub subsystem: Subsystem,
    pub name: String,
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{}", self.subsystem, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Tty,
    Net,
    Wdm,
    UsbMisc,
}

impl Default for Subsystem {
    fn default() -> Self {
        Subsystem::Tty
    }
}

/// The role a port plays within its owning modem (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    Primary,
    Secondary,
    Data,
    Qcdm,
    Gps,
    Audio,
    Ignored,
    Unknown,
}

/// Per-port flags (spec §3). A small closed bitset; hand-rolled rather than
/// pulled in via a dependency since it never grows past three members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortFlags(u8);

impl PortFlags {
    pub const PPP: PortFlags = PortFlags(0b001);
    pub const SECONDARY_AT: PortFlags = PortFlags(0b010);
    pub const GPS_CONTROL: PortFlags = PortFlags(0b100);

    pub const fn empty() -> Self {
        PortFlags(0)
    }

    pub fn contains(&self, other: PortFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PortFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: PortFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for PortFlags {
    type Output = PortFlags;
    fn bitor(self, rhs: PortFlags) -> PortFlags {
        PortFlags(self.0 | rhs.0)
    }
}

/// A classified port belonging to a modem (spec §3 `Port`).
#[derive(Debug, Clone)]
pub struct Port {
    pub id: PortId,
    pub device_path: String,
    pub driver: String,
    pub parent_path: String,
    pub port_type: PortType,
    pub flags: PortFlags,
    pub properties: HashMap<String, String>,
}

impl Port {
    pub fn new(id: PortId, device_path: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            id,
            device_path: device_path.into(),
            driver: driver.into(),
            parent_path: String::new(),
            port_type: PortType::Unknown,
            flags: PortFlags::empty(),
            properties: HashMap::new(),
        }
    }
}

/// A set of a modem's currently-open ports, reference-counted so
/// initialization and enabling can hold independent handles without a
/// premature close racing a concurrent shutdown (spec §4.5, `PortsContext`).
#[derive(Debug, Clone, Default)]
pub struct PortsContext {
    inner: std::sync::Arc<PortsContextInner>,
}

#[derive(Debug, Default)]
struct PortsContextInner {
    primary: Option<PortId>,
    secondary: Option<PortId>,
    qcdm: Option<PortId>,
}

impl PortsContext {
    pub fn new(primary: Option<PortId>, secondary: Option<PortId>, qcdm: Option<PortId>) -> Self {
        Self {
            inner: std::sync::Arc::new(PortsContextInner {
                primary,
                secondary,
                qcdm,
            }),
        }
    }

    pub fn primary(&self) -> Option<&PortId> {
        self.inner.primary.as_ref()
    }

    pub fn secondary(&self) -> Option<&PortId> {
        self.inner.secondary.as_ref()
    }

    pub fn qcdm(&self) -> Option<&PortId> {
        self.inner.qcdm.as_ref()
    }

    /// Number of live handles referencing this port set (including this
    /// one); used to decide whether a close can run immediately or must
    /// wait for a racing holder to drop (spec §4.5).
    pub fn handle_count(&self) -> usize {
        std::sync::Arc::strong_count(&self.inner)
    }
}

/// Invariant I4: at most one Primary AT port exists per modem at any time.
pub fn assert_single_primary(ports: &[Port]) -> bool {
    ports
        .iter()
        .filter(|p| p.port_type == PortType::Primary)
        .count()
        <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(kind: PortType) -> Port {
        let mut p = Port::new(
            PortId {
                subsystem: Subsystem::Tty,
                name: "ttyUSB0".into(),
            },
            "/dev/ttyUSB0",
            "option",
        );
        p.port_type = kind;
        p
    }

    #[test]
    fn i4_single_primary_invariant() {
        let ports = vec![port(PortType::Primary), port(PortType::Secondary)];
        assert!(assert_single_primary(&ports));

        let ports = vec![port(PortType::Primary), port(PortType::Primary)];
        assert!(!assert_single_primary(&ports));
    }

    #[test]
    fn ports_context_ref_counts_independent_handles() {
        let ctx = PortsContext::new(None, None, None);
        assert_eq!(ctx.handle_count(), 1);
        let other = ctx.clone();
        assert_eq!(ctx.handle_count(), 2);
        drop(other);
        assert_eq!(ctx.handle_count(), 1);
    }
}
