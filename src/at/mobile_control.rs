//! Base modem control commands (spec §4.4.1 Modem capability: init
//! sequence, power state, charset selection, identification, signal
//! quality).
//!
//! Grounded on the teacher's `src/command/mobile_control` module for the
//! `ATZ`/`+CFUN`/`+CMEE` shapes; the identification and charset commands
//! (`+GCAP`, `ATI`, `+CGMI` family, `+CSCS`, `+CIND`, `+CSQ`) are
//! reimplemented against [`super::AtCommand`] from spec §4.4.1/§6 directly,
//! since the teacher targets u-blox modules specifically and narrows these
//! to its own vendor dialect.

use std::time::Duration;

use super::{split_args, split_response_prefix, unquote, AtCommand};
use crate::error::Result;

/// A bare AT action command with no response body beyond the terminal
/// token (`ATZ`, `E0 V1`, flow-control, power state).
pub struct PlainCommand {
    text: &'static str,
    timeout: Duration,
}

impl PlainCommand {
    pub const fn new(text: &'static str) -> Self {
        Self {
            text,
            timeout: Duration::from_secs(10),
        }
    }

    pub const fn with_timeout(text: &'static str, timeout: Duration) -> Self {
        Self { text, timeout }
    }
}

impl AtCommand for PlainCommand {
    type Response = ();

    fn command_text(&self) -> String {
        self.text.to_string()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `ATZ` — reset to the stored profile, first step of the Enable init
/// sequence (spec §4.4.1).
pub const RESET: PlainCommand = PlainCommand::new("Z");
/// `E0 V1` — echo off, verbose result codes.
pub const ECHO_OFF_VERBOSE: PlainCommand = PlainCommand::new("E0 V1");
/// `+CMEE=1` — numeric `+CME ERROR` codes instead of bare `ERROR`.
pub const NUMERIC_CME_ERRORS: PlainCommand = PlainCommand::new("+CMEE=1");
/// `X4 &C1` — extended result codes, DCD follows carrier.
pub const RESULT_CODE_PROFILE: PlainCommand = PlainCommand::new("X4 &C1");

/// `+IFC=1,1` / `+IFC=2,2` — flow control; errors here are non-fatal
/// (spec §4.4.1 "treat errors as non-fatal").
pub fn flow_control(mode: FlowControl) -> PlainCommand {
    match mode {
        FlowControl::Xon => PlainCommand::new("+IFC=1,1"),
        FlowControl::Rtscts => PlainCommand::new("+IFC=2,2"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    Xon,
    Rtscts,
}

/// `+CFUN=<n>` — radio power state (1 = full, 4/0 = low-power/off).
pub struct SetFunctionality(pub u8);

impl AtCommand for SetFunctionality {
    type Response = ();

    fn command_text(&self) -> String {
        format!("+CFUN={}", self.0)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `+GCAP` — the generic capability probe used both at Modem-init and by
/// the Plugin Router's probing sequence (spec §4.4.1, §4.6).
pub struct QueryCapabilities;

impl AtCommand for QueryCapabilities {
    type Response = Vec<String>;

    fn command_text(&self) -> String {
        "+GCAP".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("GCAP".into())
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<String>> {
        let line = lines
            .iter()
            .find_map(|l| split_response_prefix(l, "+GCAP:"))
            .unwrap_or("");
        Ok(split_args(line)
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// `ATI` / `ATI1` — free-text identification banner, folded into the
/// device-identifier hash (spec §4.4.1).
pub struct QueryIdentification {
    pub variant: u8,
}

impl AtCommand for QueryIdentification {
    type Response = String;

    fn command_text(&self) -> String {
        if self.variant == 0 {
            "I".into()
        } else {
            format!("I{}", self.variant)
        }
    }

    fn parse(&self, lines: &[String]) -> Result<String> {
        Ok(lines.join("\n"))
    }
}

macro_rules! single_line_string_query {
    ($name:ident, $text:literal) => {
        pub struct $name;

        impl AtCommand for $name {
            type Response = String;

            fn command_text(&self) -> String {
                $text.into()
            }

            fn cache_key(&self) -> Option<String> {
                Some($text.into())
            }

            fn parse(&self, lines: &[String]) -> Result<String> {
                Ok(lines.first().cloned().unwrap_or_default().trim().to_string())
            }
        }
    };
}

single_line_string_query!(QueryManufacturer, "+CGMI");
single_line_string_query!(QueryModel, "+CGMM");
single_line_string_query!(QueryEquipmentIdentifier, "+CGSN");
single_line_string_query!(QueryRevision, "+CGMR");

/// `+CNUM` — this modem's own phone number(s) (spec §4.4.1).
pub struct QueryOwnNumbers;

impl AtCommand for QueryOwnNumbers {
    type Response = Vec<String>;

    fn command_text(&self) -> String {
        "+CNUM".into()
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<String>> {
        Ok(lines
            .iter()
            .filter_map(|l| split_response_prefix(l, "+CNUM:"))
            .filter_map(|rest| split_args(rest).get(1).map(|s| unquote(s)))
            .collect())
    }
}

/// `+CSCS=?` — advertised charsets (spec §4.4.1, §6).
pub struct QuerySupportedCharsets;

impl AtCommand for QuerySupportedCharsets {
    type Response = Vec<crate::charset::Charset>;

    fn command_text(&self) -> String {
        "+CSCS=?".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("CSCS=?".into())
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<crate::charset::Charset>> {
        let line = lines
            .iter()
            .find_map(|l| split_response_prefix(l, "+CSCS:"))
            .unwrap_or("");
        let inner = line.trim().trim_start_matches('(').trim_end_matches(')');
        Ok(split_args(inner)
            .into_iter()
            .map(|s| crate::charset::Charset::from_at_name(&unquote(&s)))
            .filter(|c| *c != crate::charset::Charset::Unknown)
            .collect())
    }
}

/// `+CSCS="<charset>"` — select the active charset (spec §4.4.1 "select
/// character set: UCS2 preferred, else GSM, else IRA").
pub struct SetCharset(pub crate::charset::Charset);

impl AtCommand for SetCharset {
    type Response = ();

    fn command_text(&self) -> String {
        format!("+CSCS=\"{}\"", self.0.at_name())
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// One `("name",(min-max))` or `("name",(v0,v1,...))` entry from `+CIND=?`:
/// the indicator's name plus the highest value it can legally report,
/// needed to clamp an out-of-range `+CIND?` reading (spec §4.4.1, B3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorDescriptor {
    pub name: String,
    pub max: u8,
}

/// `+CIND=?` — advertised indicator fields, used to decide whether signal
/// quality can be read via `+CIND?` (spec §4.4.1).
pub struct QueryIndicatorDescriptors;

impl AtCommand for QueryIndicatorDescriptors {
    type Response = Vec<IndicatorDescriptor>;

    fn command_text(&self) -> String {
        "+CIND=?".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("CIND=?".into())
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<IndicatorDescriptor>> {
        let line = lines
            .iter()
            .find_map(|l| split_response_prefix(l, "+CIND:"))
            .unwrap_or("");
        Ok(split_args(line)
            .into_iter()
            .map(|group| {
                let inner = group.trim().trim_start_matches('(').trim_end_matches(')');
                let parts = split_args(inner);
                let name = unquote(parts.first().cloned().unwrap_or_default().as_str());
                let max = parts
                    .get(1)
                    .and_then(|range| range.trim().rsplit(['-', ',']).next()?.trim().parse().ok())
                    .unwrap_or(u8::MAX);
                IndicatorDescriptor { name, max }
            })
            .collect())
    }
}

/// `+CIND?` — current indicator values, positionally matched against the
/// descriptors from [`QueryIndicatorDescriptors`].
pub struct QueryIndicators;

impl AtCommand for QueryIndicators {
    type Response = Vec<u8>;

    fn command_text(&self) -> String {
        "+CIND?".into()
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<u8>> {
        let line = lines
            .iter()
            .find_map(|l| split_response_prefix(l, "+CIND:"))
            .unwrap_or("");
        Ok(split_args(line)
            .into_iter()
            .map(|s| s.trim().parse().unwrap_or(0))
            .collect())
    }
}

/// `+CSQ` — fallback signal quality probe (spec §4.4.1).
pub struct QuerySignalQuality;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    pub rssi: Option<u8>,
    pub ber: Option<u8>,
}

impl AtCommand for QuerySignalQuality {
    type Response = SignalQuality;

    fn command_text(&self) -> String {
        "+CSQ".into()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn parse(&self, lines: &[String]) -> Result<SignalQuality> {
        let line = lines
            .iter()
            .find_map(|l| split_response_prefix(l, "+CSQ:"))
            .unwrap_or("");
        let args = split_args(line);
        let rssi = args.first().and_then(|s| s.trim().parse().ok()).filter(|&v| v != 99);
        let ber = args.get(1).and_then(|s| s.trim().parse().ok()).filter(|&v| v != 99);
        Ok(SignalQuality { rssi, ber })
    }
}

impl SignalQuality {
    /// Maps the raw 0..31 RSSI scale to a 0..100 quality percentage (linear,
    /// the conventional 3GPP TS 27.007 `+CSQ` mapping).
    pub fn quality_percent(&self) -> Option<u8> {
        self.rssi.map(|r| ((r.min(31) as u32 * 100) / 31) as u8)
    }
}

/// `+WS46=?` — supported radio access technology modes.
pub struct QuerySupportedRadioModes;

impl AtCommand for QuerySupportedRadioModes {
    type Response = Vec<u8>;

    fn command_text(&self) -> String {
        "+WS46=?".into()
    }

    fn cache_key(&self) -> Option<String> {
        Some("WS46=?".into())
    }

    fn parse(&self, lines: &[String]) -> Result<Vec<u8>> {
        let line = lines
            .iter()
            .find_map(|l| split_response_prefix(l, "+WS46:"))
            .unwrap_or("");
        let inner = line.trim().trim_start_matches('(').trim_end_matches(')');
        Ok(split_args(inner)
            .into_iter()
            .filter_map(|s| s.trim().parse().ok())
            .collect())
    }
}

/// `+WS46=<mode>` — select the allowed radio access technology mode (spec
/// §4.4.6 "Set-Allowed-Modes").
pub struct SetAllowedModes(pub u8);

impl AtCommand for SetAllowedModes {
    type Response = ();

    fn command_text(&self) -> String {
        format!("+WS46={}", self.0)
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csq_parses_and_maps_to_percent() {
        let resp = QuerySignalQuality.parse(&["+CSQ: 20,99".into()]).unwrap();
        assert_eq!(resp.rssi, Some(20));
        assert_eq!(resp.ber, None);
        assert_eq!(resp.quality_percent(), Some(64));
    }

    #[test]
    fn csq_unknown_is_none_not_error() {
        let resp = QuerySignalQuality.parse(&["+CSQ: 99,99".into()]).unwrap();
        assert_eq!(resp.rssi, None);
        assert_eq!(resp.quality_percent(), None);
    }

    #[test]
    fn gcap_parses_capability_list() {
        let resp = QueryCapabilities
            .parse(&["+GCAP: +CGSM,+FCLASS,+DS".into()])
            .unwrap();
        assert_eq!(resp, vec!["+CGSM", "+FCLASS", "+DS"]);
    }

    #[test]
    fn cind_descriptors_extract_names_and_declared_max() {
        let resp = QueryIndicatorDescriptors
            .parse(&["+CIND: (\"signal\",(0-5)),(\"service\",(0-1))".into()])
            .unwrap();
        assert_eq!(
            resp,
            vec![
                IndicatorDescriptor {
                    name: "signal".into(),
                    max: 5
                },
                IndicatorDescriptor {
                    name: "service".into(),
                    max: 1
                },
            ]
        );
    }

    #[test]
    fn cind_descriptor_max_from_enumerated_value_list() {
        let resp = QueryIndicatorDescriptors
            .parse(&["+CIND: (\"signal\",(0,1,2,3,4,5))".into()])
            .unwrap();
        assert_eq!(resp[0].max, 5);
    }

    #[test]
    fn cind_values_parse_positionally() {
        let resp = QueryIndicators.parse(&["+CIND: 4,1".into()]).unwrap();
        assert_eq!(resp, vec![4, 1]);
    }

    #[test]
    fn cnum_extracts_number_field() {
        let resp = QueryOwnNumbers
            .parse(&["+CNUM: \"Line 1\",\"+15551234567\",145".into()])
            .unwrap();
        assert_eq!(resp, vec!["+15551234567"]);
    }
}
