//! Bearer data model and the modem's bearer list (spec §3 `Bearer`, §4.4.6
//! "Create-or-Reuse-Bearer").

use crate::error::{Error, Result};
use crate::port::PortId;

/// spec §3 "current connection status".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// SPEC_FULL.md ambient supplement: the bearer's negotiated IP family,
/// since `+CGDCONT`'s PDP type and the APN's actual allocation can diverge
/// (IPv4v6 falling back to IPv4-only, for instance) and callers need to
/// know which one actually came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IpFamily {
    Ipv4,
    Ipv6,
    Ipv4v6,
    Unknown,
}

/// spec §3 `Bearer`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Bearer {
    pub apn: String,
    pub ip_family: IpFamily,
    pub user: Option<String>,
    pub password: Option<String>,
    pub allow_roaming: bool,
    pub status: ConnectionStatus,
    pub cid: u8,
    #[serde(skip)]
    pub primary_port: Option<PortId>,
    #[serde(skip)]
    pub data_port: Option<PortId>,
}

impl Bearer {
    pub fn new(apn: String, cid: u8) -> Self {
        Self {
            apn,
            ip_family: IpFamily::Unknown,
            user: None,
            password: None,
            allow_roaming: true,
            status: ConnectionStatus::Disconnected,
            cid,
            primary_port: None,
            data_port: None,
        }
    }

    /// Invariant: the Bearer holds its data port exclusively while
    /// Connected/Connecting (spec §3).
    pub fn holds_data_port_exclusively(&self) -> bool {
        matches!(self.status, ConnectionStatus::Connected | ConnectionStatus::Connecting)
    }
}

/// Owns every Bearer for one Modem, enforcing CID uniqueness (spec §3
/// "at any moment, each CID is owned by at most one Bearer").
#[derive(Debug, Default)]
pub struct BearerList {
    bearers: Vec<Bearer>,
}

impl BearerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `bearer`, rejecting it if its CID is already in use.
    pub fn add(&mut self, bearer: Bearer) -> Result<()> {
        if self.bearers.iter().any(|b| b.cid == bearer.cid) {
            return Err(Error::Other(format!("CID {} already in use", bearer.cid)));
        }
        self.bearers.push(bearer);
        Ok(())
    }

    pub fn remove(&mut self, cid: u8) -> Option<Bearer> {
        let pos = self.bearers.iter().position(|b| b.cid == cid)?;
        Some(self.bearers.remove(pos))
    }

    pub fn get(&self, cid: u8) -> Option<&Bearer> {
        self.bearers.iter().find(|b| b.cid == cid)
    }

    pub fn get_mut(&mut self, cid: u8) -> Option<&mut Bearer> {
        self.bearers.iter_mut().find(|b| b.cid == cid)
    }

    /// Finds an existing bearer matching `apn`, for Connect's
    /// Create-or-Reuse-Bearer step (spec §4.4.6).
    pub fn find_by_apn(&self, apn: &str) -> Option<&Bearer> {
        self.bearers.iter().find(|b| b.apn == apn)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bearer> {
        self.bearers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bearer> {
        self.bearers.iter_mut()
    }

    /// The next free CID in 1..=255, the range spec §3 declares.
    pub fn next_free_cid(&self) -> Option<u8> {
        (1u8..=255).find(|c| self.get(*c).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i5_duplicate_cid_rejected() {
        let mut list = BearerList::new();
        list.add(Bearer::new("apn1".into(), 1)).unwrap();
        let err = list.add(Bearer::new("apn2".into(), 1)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }

    #[test]
    fn reuses_bearer_by_apn() {
        let mut list = BearerList::new();
        list.add(Bearer::new("internet".into(), 1)).unwrap();
        assert!(list.find_by_apn("internet").is_some());
        assert!(list.find_by_apn("other").is_none());
    }

    #[test]
    fn next_free_cid_skips_used_ones() {
        let mut list = BearerList::new();
        list.add(Bearer::new("a".into(), 1)).unwrap();
        assert_eq!(list.next_free_cid(), Some(2));
    }
}
