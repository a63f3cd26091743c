//! SIM lock / facility-lock commands (spec §4.4.1 "the unlock state (via
//! `+CPIN?`)", §4.4.2 "Facility-locks load", §4.4.6 Unlock-Check).
//!
//! Grounded on the teacher's `src/command/device_lock` module for the
//! `+CPIN`/`+CLCK` command shapes, reworked against [`super::AtCommand`].

use std::time::Duration;

use super::{split_args, unquote, AtCommand};
use crate::error::{Error, Result};

/// SIM/lock state as reported by `+CPIN?` (spec §3 `SIM.lock_state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PinStatus {
    Ready,
    SimPin,
    SimPuk,
    SimPin2,
    SimPuk2,
    PhSimPin,
    PhNetPin,
    Unknown,
}

impl PinStatus {
    fn from_code(s: &str) -> PinStatus {
        match s.trim() {
            "READY" => PinStatus::Ready,
            "SIM PIN" => PinStatus::SimPin,
            "SIM PUK" => PinStatus::SimPuk,
            "SIM PIN2" => PinStatus::SimPin2,
            "SIM PUK2" => PinStatus::SimPuk2,
            "PH-SIM PIN" => PinStatus::PhSimPin,
            "PH-NET PIN" => PinStatus::PhNetPin,
            _ => PinStatus::Unknown,
        }
    }
}

/// `+CPIN?` — query the current lock state.
pub struct QueryPinStatus;

impl AtCommand for QueryPinStatus {
    type Response = PinStatus;

    fn command_text(&self) -> String {
        "+CPIN?".into()
    }

    fn parse(&self, lines: &[String]) -> Result<PinStatus> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CPIN:"))
            .ok_or_else(|| Error::ParseError("no +CPIN: line in response".into()))?;
        Ok(PinStatus::from_code(line))
    }
}

/// `+CPIN=<pin>[,<new_pin>]` — unlock with a PIN/PUK (spec §4.4.6
/// "A PIN supplied in properties is consumed by Unlock-Check").
pub struct SendPin {
    pub pin: String,
    pub new_pin: Option<String>,
}

impl AtCommand for SendPin {
    type Response = ();

    fn command_text(&self) -> String {
        match &self.new_pin {
            Some(new_pin) => format!("+CPIN=\"{}\",\"{new_pin}\"", self.pin),
            None => format!("+CPIN=\"{}\"", self.pin),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `+CPINR` — remaining unlock retry counts, when supported (SPEC_FULL.md
/// ambient supplement: `Modem.unlock_retries`).
pub struct QueryPinRetries;

#[derive(Debug, Clone, Default)]
pub struct PinRetries {
    pub sim_pin: Option<u32>,
    pub sim_puk: Option<u32>,
}

impl AtCommand for QueryPinRetries {
    type Response = PinRetries;

    fn command_text(&self) -> String {
        "+CPINR?".into()
    }

    fn parse(&self, lines: &[String]) -> Result<PinRetries> {
        let mut retries = PinRetries::default();
        for line in lines {
            let Some(rest) = super::split_response_prefix(line, "+CPINR:") else {
                continue;
            };
            let args = split_args(rest);
            if args.len() < 2 {
                continue;
            }
            let count: u32 = args[1].trim().parse().unwrap_or(0);
            match unquote(&args[0]).as_str() {
                "SIM PIN" => retries.sim_pin = Some(count),
                "SIM PUK" => retries.sim_puk = Some(count),
                _ => {}
            }
        }
        Ok(retries)
    }
}

/// One facility's lock state, as enumerated by `+CLCK="<fac>",2` (spec
/// §4.4.2 "Facility-locks load").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityLockState {
    Locked,
    Unlocked,
    Unknown,
}

/// `+CLCK=?` — the set of facilities this modem advertises.
pub struct QuerySupportedFacilities;

impl AtCommand for QuerySupportedFacilities {
    type Response = Vec<String>;

    fn command_text(&self) -> String {
        "+CLCK=?".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("CLCK=?".into())
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<String>> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CLCK:"))
            .unwrap_or("");
        let inner = line.trim().trim_start_matches('(').trim_end_matches(')');
        Ok(split_args(inner)
            .into_iter()
            .map(|s| unquote(&s))
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// `+CLCK="<facility>",2` — query one facility's current lock state. A
/// query error is recorded as "unknown" rather than failing the whole
/// batch (spec §4.4.2).
pub struct QueryFacilityLock {
    pub facility: String,
}

impl AtCommand for QueryFacilityLock {
    type Response = FacilityLockState;

    fn command_text(&self) -> String {
        format!("+CLCK=\"{}\",2", self.facility)
    }

    fn parse(&self, lines: &[String]) -> Result<FacilityLockState> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CLCK:"));
        let Some(line) = line else {
            return Ok(FacilityLockState::Unknown);
        };
        let args = split_args(line);
        Ok(match args.first().map(|s| s.trim()) {
            Some("1") => FacilityLockState::Locked,
            Some("0") => FacilityLockState::Unlocked,
            _ => FacilityLockState::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpin_ready_parses() {
        let resp = QueryPinStatus.parse(&["+CPIN: READY".into()]).unwrap();
        assert_eq!(resp, PinStatus::Ready);
    }

    #[test]
    fn cpin_sim_pin_parses() {
        let resp = QueryPinStatus.parse(&["+CPIN: SIM PIN".into()]).unwrap();
        assert_eq!(resp, PinStatus::SimPin);
    }

    #[test]
    fn facility_query_error_is_unknown_not_fatal() {
        let resp = QueryFacilityLock {
            facility: "SC".into(),
        }
        .parse(&[])
        .unwrap();
        assert_eq!(resp, FacilityLockState::Unknown);
    }

    #[test]
    fn supported_facilities_parses_quoted_list() {
        let resp = QuerySupportedFacilities
            .parse(&["+CLCK: (\"SC\",\"PN\",\"FD\")".into()])
            .unwrap();
        assert_eq!(resp, vec!["SC", "PN", "FD"]);
    }
}
