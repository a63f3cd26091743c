//! Registration state aggregation (spec §3 `RegistrationState`, §4.4.2/
//! §4.4.3 "aggregate Modem registration state").
//!
//! Per-domain state comes from the AT `+CxREG` family for 3GPP
//! (`at::network_service`) and from the combination of `+CAD`/`+CSS`/QCDM
//! `cdma_status`/Sprint `$SPERI` for CDMA (`at::cdma`, `qcdm`). This module
//! holds the shared vocabulary and the fold rule both paths feed into.

use crate::at::network_service::{RawStat, RegDomain};

/// spec §3 `RegistrationState`, per domain (CS, PS, EPS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RegistrationState {
    Unknown,
    Idle,
    Searching,
    Denied,
    RegisteredHome,
    RegisteredRoaming,
}

impl RegistrationState {
    pub fn is_registered(self) -> bool {
        matches!(self, RegistrationState::RegisteredHome | RegistrationState::RegisteredRoaming)
    }

    /// Maps a raw 3GPP `<stat>` code onto the domain-level state (spec
    /// §4.4.2 "Update aggregate registration per §3").
    pub fn from_raw_stat(stat: RawStat) -> RegistrationState {
        match stat {
            RawStat::NotRegistered => RegistrationState::Idle,
            RawStat::RegisteredHome => RegistrationState::RegisteredHome,
            RawStat::Searching => RegistrationState::Searching,
            RawStat::Denied => RegistrationState::Denied,
            RawStat::RegisteredRoaming => RegistrationState::RegisteredRoaming,
            RawStat::Unknown => RegistrationState::Unknown,
        }
    }
}

/// Per-domain registration snapshot, updated as CREG/CGREG/CEREG reports
/// arrive (spec §4.4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainRegistration {
    pub cs: Option<RegistrationState>,
    pub ps: Option<RegistrationState>,
    pub eps: Option<RegistrationState>,
}

impl DomainRegistration {
    pub fn set(&mut self, domain: RegDomain, state: RegistrationState) {
        match domain {
            RegDomain::Cs => self.cs = Some(state),
            RegDomain::Ps => self.ps = Some(state),
            RegDomain::Eps => self.eps = Some(state),
        }
    }

    /// The aggregate Modem registration state: Registered iff any domain is
    /// Registered-Home or Registered-Roaming (spec §3).
    pub fn aggregate(&self) -> RegistrationState {
        let domains = [self.cs, self.ps, self.eps];
        if domains.iter().flatten().any(|s| s.is_registered()) {
            // Prefer Home over Roaming when domains disagree, matching the
            // "any Registered-Home" half of the spec's disjunction first.
            if domains.iter().flatten().any(|s| *s == RegistrationState::RegisteredHome) {
                return RegistrationState::RegisteredHome;
            }
            return RegistrationState::RegisteredRoaming;
        }
        if domains.iter().flatten().any(|s| *s == RegistrationState::Denied) {
            return RegistrationState::Denied;
        }
        if domains.iter().flatten().any(|s| *s == RegistrationState::Searching) {
            return RegistrationState::Searching;
        }
        if domains.iter().flatten().any(|s| *s == RegistrationState::Idle) {
            return RegistrationState::Idle;
        }
        RegistrationState::Unknown
    }
}

/// CDMA registration, folding the four probes spec §4.4.3 names. QCDM
/// `cdma_status` is authoritative over AT `+CSS`/`+CAD` when a QCDM port
/// exists; the Sprint `$SPERI` roaming bit, when supported, overrides
/// whatever roaming guess the rest of the fold produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdmaRegistration {
    pub cad_service: Option<bool>,
    pub css_has_service: Option<bool>,
    pub qcdm_acquired: Option<bool>,
    pub sprint_roaming: Option<bool>,
}

impl CdmaRegistration {
    pub fn state(&self) -> RegistrationState {
        let has_service = self
            .qcdm_acquired
            .or(self.css_has_service)
            .or(self.cad_service)
            .unwrap_or(false);

        if !has_service {
            return RegistrationState::Idle;
        }
        match self.sprint_roaming {
            Some(true) => RegistrationState::RegisteredRoaming,
            Some(false) => RegistrationState::RegisteredHome,
            None => RegistrationState::RegisteredHome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_prefers_home_when_any_domain_is_home() {
        let mut reg = DomainRegistration::default();
        reg.set(RegDomain::Cs, RegistrationState::RegisteredRoaming);
        reg.set(RegDomain::Ps, RegistrationState::RegisteredHome);
        assert_eq!(reg.aggregate(), RegistrationState::RegisteredHome);
    }

    #[test]
    fn aggregate_is_idle_when_nothing_registered_or_searching() {
        let mut reg = DomainRegistration::default();
        reg.set(RegDomain::Cs, RegistrationState::Idle);
        assert_eq!(reg.aggregate(), RegistrationState::Idle);
    }

    #[test]
    fn cdma_qcdm_overrides_css_when_present() {
        let reg = CdmaRegistration {
            cad_service: Some(true),
            css_has_service: Some(true),
            qcdm_acquired: Some(false),
            sprint_roaming: None,
        };
        assert_eq!(reg.state(), RegistrationState::Idle);
    }

    #[test]
    fn cdma_sprint_roaming_overrides_default_home_guess() {
        let reg = CdmaRegistration {
            cad_service: Some(true),
            css_has_service: None,
            qcdm_acquired: None,
            sprint_roaming: Some(true),
        };
        assert_eq!(reg.state(), RegistrationState::RegisteredRoaming);
    }
}
