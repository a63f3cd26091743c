//! SMS storage and transfer commands (spec §4.4.4 Messaging).
//!
//! No teacher module covers SMS (the teacher is a PPP/data-call crate);
//! grounded directly on spec §4.4.4 and 3GPP TS 27.005's `+CMGF`/`+CPMS`/
//! `+CMGL`/`+CMGR`/`+CMGS`/`+CNMI`/`+CDS` command set, built the same way
//! the sibling `at::network_service`/`at::cdma` modules are.

use std::time::Duration;

use super::{split_args, unquote, AtCommand};
use crate::error::{Error, Result};

/// The three logical SMS storages 3GPP TS 27.005 defines (spec §4.4.4
/// "three logical storages ... MEM1/MEM2/MEM3").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    Me,
    Sm,
    Mt,
    Sr,
    Bm,
    Ta,
}

impl Storage {
    pub fn at_name(self) -> &'static str {
        match self {
            Storage::Me => "ME",
            Storage::Sm => "SM",
            Storage::Mt => "MT",
            Storage::Sr => "SR",
            Storage::Bm => "BM",
            Storage::Ta => "TA",
        }
    }

    pub fn from_at_name(s: &str) -> Option<Storage> {
        match s.trim().trim_matches('"') {
            "ME" => Some(Storage::Me),
            "SM" => Some(Storage::Sm),
            "MT" => Some(Storage::Mt),
            "SR" => Some(Storage::Sr),
            "BM" => Some(Storage::Bm),
            "TA" => Some(Storage::Ta),
            _ => None,
        }
    }
}

/// spec §3 `SmsPart.state`; Open Question 1: an entry with a missing
/// `<stat>` field is `Unknown`, never defaulted to `Received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsState {
    Received,
    Stored,
    Sent,
    Unknown,
}

impl SmsState {
    /// `<stat>` as used by `+CMGL`/`+CMGR` in PDU mode (3GPP TS 27.005
    /// §3.1): 0 = unread, 1 = read, 2 = unsent, 3 = sent.
    fn from_pdu_stat(code: &str) -> SmsState {
        match code.trim() {
            "0" | "1" => SmsState::Received,
            "2" => SmsState::Stored,
            "3" => SmsState::Sent,
            _ => SmsState::Unknown,
        }
    }
}

/// `+CNMI=?` — messaging support probe (spec §4.4.4 "Check support").
pub struct ProbeMessagingSupport;

impl AtCommand for ProbeMessagingSupport {
    type Response = ();

    fn command_text(&self) -> String {
        "+CNMI=?".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("CNMI=?".into())
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `+CNMI=2,1,2,1,0` — register for `+CMTI`/`+CDS` unsolicited delivery
/// (spec §4.4.4 "Unsolicited receive").
pub struct EnableUnsolicitedDelivery;

impl AtCommand for EnableUnsolicitedDelivery {
    type Response = ();

    fn command_text(&self) -> String {
        "+CNMI=2,1,2,1,0".into()
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `+CMGF=?` — which modes (text/PDU) this modem supports.
pub struct QuerySupportedModes;

impl AtCommand for QuerySupportedModes {
    type Response = Vec<u8>;

    fn command_text(&self) -> String {
        "+CMGF=?".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("CMGF=?".into())
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<u8>> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CMGF:"))
            .unwrap_or("");
        let inner = line.trim().trim_start_matches('(').trim_end_matches(')');
        Ok(split_args(inner)
            .into_iter()
            .filter_map(|s| s.trim().parse().ok())
            .collect())
    }
}

/// `+CMGF=<mode>` — select PDU (0, preferred) or text (1) mode (spec
/// §4.4.4 "Preferred mode").
pub struct SetMode(pub u8);

impl AtCommand for SetMode {
    type Response = ();

    fn command_text(&self) -> String {
        format!("+CMGF={}", self.0)
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `+CPMS=?` — the storages this modem advertises as valid MEM1/MEM2/MEM3
/// values (spec §4.4.4 "Initial list: ... for each storage in the device's
/// declared MEM1 support").
pub struct QuerySupportedStorages;

impl AtCommand for QuerySupportedStorages {
    type Response = Vec<Storage>;

    fn command_text(&self) -> String {
        "+CPMS=?".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("CPMS=?".into())
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<Storage>> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CPMS:"))
            .ok_or_else(|| Error::ParseError("no +CPMS: line in response".into()))?;
        // The first parenthesised group is the MEM1 allow-list; the rest
        // (MEM2, MEM3) share the same vocabulary for this purpose.
        let first_group = line
            .split(')')
            .next()
            .unwrap_or("")
            .trim_start_matches('(');
        Ok(split_args(first_group)
            .into_iter()
            .filter_map(|s| Storage::from_at_name(&unquote(&s)))
            .collect())
    }
}

/// `+CPMS="<mem1>","<mem2>"[,"<mem3>"]` — select the active storages
/// (spec §4.4.4 `lock_storages`).
pub struct SetStorages {
    pub mem1: Storage,
    pub mem2: Storage,
    pub mem3: Option<Storage>,
}

impl AtCommand for SetStorages {
    type Response = ();

    fn command_text(&self) -> String {
        match self.mem3 {
            Some(mem3) => format!(
                "+CPMS=\"{}\",\"{}\",\"{}\"",
                self.mem1.at_name(),
                self.mem2.at_name(),
                mem3.at_name()
            ),
            None => format!("+CPMS=\"{}\",\"{}\"", self.mem1.at_name(), self.mem2.at_name()),
        }
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// One raw `+CMGL`/`+CMGR` entry: index, state, and the still-undecoded
/// PDU hex (decoding the TPDU itself is [`crate::sms`]'s job once the
/// `Sms`/`SmsPart` data model exists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSmsEntry {
    pub index: u32,
    pub state: SmsState,
    pub pdu_hex: String,
}

/// `+CMGL=4` (PDU mode "all") — list every entry in the active MEM1
/// storage (spec §4.4.4 "Initial list").
pub struct ListMessages;

impl AtCommand for ListMessages {
    type Response = Vec<RawSmsEntry>;

    fn command_text(&self) -> String {
        "+CMGL=4".into()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<RawSmsEntry>> {
        let mut entries = Vec::new();
        let mut iter = lines.iter();
        while let Some(line) = iter.next() {
            let Some(header) = super::split_response_prefix(line, "+CMGL:") else {
                continue;
            };
            let args = split_args(header);
            let index = args
                .first()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| Error::ParseError("+CMGL: missing index".into()))?;
            // Open Question 1: a missing <stat> field is Unknown, not Received.
            let state = args
                .get(1)
                .map(|s| SmsState::from_pdu_stat(s))
                .unwrap_or(SmsState::Unknown);
            let pdu_hex = iter.next().cloned().unwrap_or_default();
            entries.push(RawSmsEntry {
                index,
                state,
                pdu_hex,
            });
        }
        Ok(entries)
    }
}

/// `+CMGR=<index>` — read one stored message (spec §4.4.4).
pub struct ReadMessage {
    pub index: u32,
}

impl AtCommand for ReadMessage {
    type Response = RawSmsEntry;

    fn command_text(&self) -> String {
        format!("+CMGR={}", self.index)
    }

    fn parse(&self, lines: &[String]) -> Result<RawSmsEntry> {
        let header = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CMGR:"))
            .ok_or_else(|| Error::ParseError("no +CMGR: line in response".into()))?;
        let args = split_args(header);
        let state = args
            .first()
            .map(|s| SmsState::from_pdu_stat(s))
            .unwrap_or(SmsState::Unknown);
        let pdu_hex = lines
            .iter()
            .find(|l| !l.starts_with("+CMGR:"))
            .cloned()
            .unwrap_or_default();
        Ok(RawSmsEntry {
            index: self.index,
            state,
            pdu_hex,
        })
    }
}

/// `+CMTI: "<storage>",<index>` — new-message URC body (spec §4.4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessageIndicator {
    pub storage: Storage,
    pub index: u32,
}

pub fn parse_cmti_body(body: &str) -> Result<NewMessageIndicator> {
    let args = split_args(body);
    let storage = args
        .first()
        .and_then(|s| Storage::from_at_name(&unquote(s)))
        .ok_or_else(|| Error::ParseError("unrecognized +CMTI storage".into()))?;
    let index = args
        .get(1)
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| Error::ParseError("+CMTI missing index".into()))?;
    Ok(NewMessageIndicator { storage, index })
}

/// `+CDS: <length>` followed by the inline status-report PDU (spec §4.4.4
/// "On `+CDS`: parse the inline PDU; never touch storage").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryStatusReport {
    pub pdu_hex: String,
}

pub fn parse_cds_frames(header: &str, pdu_line: &str) -> Result<DeliveryStatusReport> {
    let _length: u32 = super::split_response_prefix(header, "+CDS:")
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| Error::ParseError("malformed +CDS: header".into()))?;
    Ok(DeliveryStatusReport {
        pdu_hex: pdu_line.to_string(),
    })
}

/// `+CMGS=<len>` header, paired with the PDU body written as a raw
/// continuation once the modem's `> ` prompt appears. This crate's
/// Command Queue models one command as one write-then-terminal exchange
/// (spec §4.2), so the prompt/Ctrl-Z continuation is handled by
/// `Modem`/`Messaging` capability code driving [`crate::queue::CommandQueue`]
/// directly for this one command rather than through [`AtCommand`] — noted
/// in DESIGN.md.
pub struct SendMessageHeader {
    pub pdu_octet_len: usize,
}

impl AtCommand for SendMessageHeader {
    type Response = ();

    fn command_text(&self) -> String {
        format!("+CMGS={}", self.pdu_octet_len)
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmgl_missing_stat_is_unknown_not_received() {
        let entries = ListMessages
            .parse(&["+CMGL: 3".to_string(), "0011000A91...".to_string()])
            .unwrap();
        assert_eq!(entries[0].state, SmsState::Unknown);
    }

    #[test]
    fn cmgl_parses_index_state_and_pdu() {
        let entries = ListMessages
            .parse(&["+CMGL: 1,1".to_string(), "DEADBEEF".to_string()])
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[0].state, SmsState::Received);
        assert_eq!(entries[0].pdu_hex, "DEADBEEF");
    }

    #[test]
    fn cmti_parses_storage_and_index() {
        let ind = parse_cmti_body("\"SM\",3").unwrap();
        assert_eq!(ind.storage, Storage::Sm);
        assert_eq!(ind.index, 3);
    }

    #[test]
    fn supported_storages_parses_mem1_allow_list() {
        let storages = QuerySupportedStorages
            .parse(&["+CPMS: (\"SM\",\"ME\"),(\"SM\",\"ME\"),(\"SM\",\"ME\")".to_string()])
            .unwrap();
        assert_eq!(storages, vec![Storage::Sm, Storage::Me]);
    }

    #[test]
    fn storage_name_round_trips() {
        for s in [Storage::Me, Storage::Sm, Storage::Mt, Storage::Sr, Storage::Bm, Storage::Ta] {
            assert_eq!(Storage::from_at_name(s.at_name()), Some(s));
        }
    }
}
