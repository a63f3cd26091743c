//! 3GPP network-service commands (spec §4.4.2): registration reporting and
//! checks, network scan, manual/automatic registration, indicator-event
//! configuration.
//!
//! Grounded on the teacher's `src/command/network_service` module for the
//! `+CREG`/`+COPS` command shapes; reworked against [`super::AtCommand`]
//! and generalized to the three registration domains (CS/PS/EPS) spec §3
//! names, which the teacher (GSM/UMTS-only) does not need to distinguish.

use std::time::Duration;

use super::{split_args, unquote, AtCommand};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegDomain {
    Cs,
    Ps,
    Eps,
}

impl RegDomain {
    fn command_prefix(self) -> &'static str {
        match self {
            RegDomain::Cs => "+CREG",
            RegDomain::Ps => "+CGREG",
            RegDomain::Eps => "+CEREG",
        }
    }
}

/// The raw `<stat>` code shared by `+CREG`/`+CGREG`/`+CEREG` (3GPP TS
/// 27.007 §7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawStat {
    NotRegistered,
    RegisteredHome,
    Searching,
    Denied,
    Unknown,
    RegisteredRoaming,
}

impl RawStat {
    fn from_code(code: u8) -> RawStat {
        match code {
            0 => RawStat::NotRegistered,
            1 => RawStat::RegisteredHome,
            2 => RawStat::Searching,
            3 => RawStat::Denied,
            5 => RawStat::RegisteredRoaming,
            _ => RawStat::Unknown,
        }
    }
}

/// One parsed `+CxREG?`/URC line: `<stat>[, <lac>, <ci>[, <act>]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub domain: RegDomain,
    pub stat: RawStat,
    pub lac: Option<String>,
    pub ci: Option<String>,
    pub act: Option<u8>,
}

/// `+CREG=2` / `+CGREG=2` / `+CEREG=2` (fall back to mode 1 on error) —
/// enables unsolicited registration reporting, optionally with location
/// (spec §4.4.2 "Configure registration reporting").
pub struct SetRegistrationReporting {
    pub domain: RegDomain,
    pub with_location: bool,
}

impl AtCommand for SetRegistrationReporting {
    type Response = ();

    fn command_text(&self) -> String {
        format!(
            "{}={}",
            self.domain.command_prefix(),
            if self.with_location { 2 } else { 1 }
        )
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `+CMER=3,0,0,1` (fall back to `+CMER=3,0,0,0`) — unsolicited indicator
/// events (spec §4.4.2 step 1).
pub struct SetIndicatorEvents {
    pub with_ciev: bool,
}

impl AtCommand for SetIndicatorEvents {
    type Response = ();

    fn command_text(&self) -> String {
        format!("+CMER=3,0,0,{}", if self.with_ciev { 1 } else { 0 })
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `+CREG?` / `+CGREG?` / `+CEREG?` — explicit registration check, also
/// used to parse the equivalent URC line with the same body shape (spec
/// §4.4.2 "Registration check").
pub struct QueryRegistration {
    pub domain: RegDomain,
}

impl AtCommand for QueryRegistration {
    type Response = RegistrationReport;

    fn command_text(&self) -> String {
        format!("{}?", self.domain.command_prefix())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn parse(&self, lines: &[String]) -> Result<RegistrationReport> {
        let prefix = format!("{}:", self.domain.command_prefix());
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, &prefix))
            .ok_or_else(|| Error::ParseError(format!("no {prefix} line in response")))?;
        parse_registration_body(self.domain, line)
    }
}

/// Parses a `+CxREG` body whether it came from a `?` query (`<n>,<stat>...`)
/// or a URC (`<stat>...` with no leading mode echo) — both shapes appear on
/// real firmware, so this accepts either by checking the argument count.
pub fn parse_registration_body(domain: RegDomain, body: &str) -> Result<RegistrationReport> {
    let args = split_args(body);
    if args.is_empty() {
        return Err(Error::ParseError("empty registration body".into()));
    }

    // `<n>,<stat>,...` (query form) has at least 2 fields and a small `<n>`;
    // a bare URC is just `<stat>,...`. Disambiguate by trying the query
    // form first when there's more than one field.
    let (stat_field, rest) = if args.len() > 1 {
        (args[1].as_str(), &args[2..])
    } else {
        (args[0].as_str(), &args[1..])
    };

    let stat = RawStat::from_code(stat_field.trim().parse().unwrap_or(255));
    let lac = rest.first().map(|s| unquote(s)).filter(|s| !s.is_empty());
    let ci = rest.get(1).map(|s| unquote(s)).filter(|s| !s.is_empty());
    let act = rest.get(2).and_then(|s| s.trim().parse().ok());

    Ok(RegistrationReport {
        domain,
        stat,
        lac,
        ci,
        act,
    })
}

/// One entry from a `+COPS=?` network scan (spec §4.4.2 "Network scan").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedOperator {
    pub status: OperatorStatus,
    pub long_name: String,
    pub short_name: String,
    pub operator_id: String,
    pub access_tech: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorStatus {
    Unknown,
    Available,
    Current,
    Forbidden,
}

impl OperatorStatus {
    fn from_code(code: &str) -> OperatorStatus {
        match code.trim() {
            "1" => OperatorStatus::Available,
            "2" => OperatorStatus::Current,
            "3" => OperatorStatus::Forbidden,
            _ => OperatorStatus::Unknown,
        }
    }
}

/// `+COPS=?` — network scan, 120 s timeout, never cached (spec §4.4.2).
pub struct ScanNetworks;

impl AtCommand for ScanNetworks {
    type Response = Vec<ScannedOperator>;

    fn command_text(&self) -> String {
        "+COPS=?".into()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<ScannedOperator>> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+COPS:"))
            .unwrap_or("");
        Ok(split_operator_groups(line)
            .into_iter()
            .filter_map(|g| parse_operator_group(&g))
            .collect())
    }
}

/// Splits the `(...),(...),(...)` groups in a `+COPS:` scan body, tolerating
/// both the modern numeric-AcT extension and the older four-quote variant
/// without a trailing AcT field (spec §4.4.2 "SHALL accept ... both").
fn split_operator_groups(body: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in body.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth > 1 {
                    current.push(c);
                }
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    groups.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            _ if depth > 0 => current.push(c),
            _ => {}
        }
    }
    groups
}

fn parse_operator_group(group: &str) -> Option<ScannedOperator> {
    let args = split_args(group);
    if args.len() < 4 {
        return None;
    }
    Some(ScannedOperator {
        status: OperatorStatus::from_code(&args[0]),
        long_name: unquote(&args[1]),
        short_name: unquote(&args[2]),
        operator_id: unquote(&args[3]),
        access_tech: args.get(4).and_then(|s| s.trim().parse().ok()),
    })
}

/// `+COPS=1,2,"<mccmnc>"` (manual) or `+COPS=0` (automatic) — register in
/// network (spec §4.4.2 "Register-in-network").
pub struct RegisterInNetwork {
    pub operator_id: Option<String>,
}

impl AtCommand for RegisterInNetwork {
    type Response = ();

    fn command_text(&self) -> String {
        match &self.operator_id {
            Some(id) => format!("+COPS=1,2,\"{id}\""),
            None => "+COPS=0".into(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_form_registration_body_parses() {
        let report = parse_registration_body(RegDomain::Cs, "2,1,\"1A2B\",\"00112233\",7").unwrap();
        assert_eq!(report.stat, RawStat::RegisteredHome);
        assert_eq!(report.lac.as_deref(), Some("1A2B"));
        assert_eq!(report.ci.as_deref(), Some("00112233"));
        assert_eq!(report.act, Some(7));
    }

    #[test]
    fn urc_form_registration_body_parses() {
        let report = parse_registration_body(RegDomain::Ps, "5,\"1A2B\",\"00112233\"").unwrap();
        assert_eq!(report.stat, RawStat::RegisteredRoaming);
        assert_eq!(report.lac.as_deref(), Some("1A2B"));
    }

    #[test]
    fn cops_scan_accepts_four_quote_variant_without_act() {
        let resp = ScanNetworks
            .parse(&["+COPS: (2,\"Carrier A\",\"CrA\",\"31026\"),(1,\"Carrier B\",\"CrB\",\"31027\")".into()])
            .unwrap();
        assert_eq!(resp.len(), 2);
        assert_eq!(resp[0].status, OperatorStatus::Current);
        assert_eq!(resp[0].access_tech, None);
    }

    #[test]
    fn cops_scan_accepts_numeric_act_extension() {
        let resp = ScanNetworks
            .parse(&["+COPS: (2,\"Carrier A\",\"CrA\",\"31026\",7)".into()])
            .unwrap();
        assert_eq!(resp[0].access_tech, Some(7));
    }

    #[test]
    fn register_in_network_automatic_when_no_operator() {
        let cmd = RegisterInNetwork { operator_id: None };
        assert_eq!(cmd.command_text(), "+COPS=0");
    }
}
