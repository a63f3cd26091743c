//! USSD commands (spec §4.4.2 "USSD: encode/decode per the modem's current
//! charset").
//!
//! Grounded on 3GPP TS 27.007 §7.38's `+CUSD` command, reimplemented
//! against [`super::AtCommand`] since the teacher does not implement USSD.

use super::{split_args, unquote, AtCommand};
use crate::charset::Charset;
use crate::error::{Error, Result};

/// `<n>` in a `+CUSD` notification/response: whether the session stays
/// open, and who closed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UssdSessionState {
    NoFurtherAction,
    ActionRequired,
    Terminated,
    OtherLocalClient,
    OperationNotSupported,
    NetworkTimeout,
}

impl UssdSessionState {
    fn from_code(code: u8) -> UssdSessionState {
        match code {
            0 => UssdSessionState::NoFurtherAction,
            1 => UssdSessionState::ActionRequired,
            2 => UssdSessionState::Terminated,
            3 => UssdSessionState::OtherLocalClient,
            4 => UssdSessionState::OperationNotSupported,
            _ => UssdSessionState::NetworkTimeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UssdNotification {
    pub state: UssdSessionState,
    pub text: Option<String>,
    pub dcs: Option<u8>,
}

/// Parses the body of a `+CUSD:` line, whether it's a command's own
/// terminal response or an unsolicited notification — both share the same
/// `<n>[,<str>,<dcs>]` shape (spec §4.4.2; Open Question 2 notes the race
/// between a user-cancel and a network `+CUSD: 0` is inherently racy and
/// left to whichever arrives first at the queue).
pub fn parse_cusd_body(body: &str) -> Result<UssdNotification> {
    let args = split_args(body);
    let code = args
        .first()
        .ok_or_else(|| Error::ParseError("empty +CUSD body".into()))?
        .trim()
        .parse::<u8>()
        .map_err(|_| Error::ParseError("non-numeric +CUSD <n>".into()))?;
    let dcs = args.get(2).and_then(|s| s.trim().parse().ok());
    let raw_text = args.get(1).map(|s| unquote(s)).filter(|s| !s.is_empty());

    let text = match (&raw_text, dcs) {
        // 15 = GSM7 default alphabet; the payload is the same GSM7-hex wire
        // form `SendUssd`'s `gsm7_hex_encode` variant produces (spec §4.4.2
        // end-to-end scenario 5), so it decodes the same way.
        (Some(raw), Some(15)) => crate::charset::decode_ussd_gsm7_hex_payload(raw)
            .ok()
            .or(Some(raw.clone())),
        (Some(raw), _) => {
            // Try UCS2-hex first (the common encoded form); fall back to the
            // literal text if it doesn't decode as hex.
            crate::charset::decode_ucs2_hex(raw).ok().or(Some(raw.clone()))
        }
        (None, _) => None,
    };

    Ok(UssdNotification {
        state: UssdSessionState::from_code(code),
        text,
        dcs,
    })
}

/// `+CUSD=1,"<payload>",<dcs>` — send a USSD request. The raw variant
/// sends `text` unencoded (charset left to the modem); the GSM7-hex
/// variant pre-encodes it (spec §4.4.2 "two variants — raw and
/// GSM7-hex-encoded").
pub struct SendUssd {
    pub text: String,
    pub charset: Charset,
    pub gsm7_hex_encode: bool,
}

impl AtCommand for SendUssd {
    type Response = UssdNotification;

    fn command_text(&self) -> String {
        let dcs = if self.gsm7_hex_encode { 15 } else { 0 };
        let payload = if self.gsm7_hex_encode {
            crate::charset::encode_ussd_gsm7_hex(&self.text).unwrap_or_else(|_| self.text.clone())
        } else {
            self.text.clone()
        };
        format!("+CUSD=1,\"{payload}\",{dcs}")
    }

    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(30)
    }

    fn parse(&self, lines: &[String]) -> Result<UssdNotification> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CUSD:"))
            .ok_or_else(|| Error::ParseError("no +CUSD: line in response".into()))?;
        parse_cusd_body(line)
    }
}

/// `+CUSD=2` — user-initiated cancel of the current session.
pub struct CancelUssd;

impl AtCommand for CancelUssd {
    type Response = ();

    fn command_text(&self) -> String {
        "+CUSD=2".into()
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terminated_with_no_text() {
        let notif = parse_cusd_body("2").unwrap();
        assert_eq!(notif.state, UssdSessionState::Terminated);
        assert_eq!(notif.text, None);
    }

    #[test]
    fn parses_action_required_with_ucs2_text() {
        let hex = crate::charset::encode_ucs2_hex("hi");
        let body = format!("1,\"{hex}\",72");
        let notif = parse_cusd_body(&body).unwrap();
        assert_eq!(notif.state, UssdSessionState::ActionRequired);
        assert_eq!(notif.text.as_deref(), Some("hi"));
    }

    #[test]
    fn send_ussd_gsm7_hex_matches_scenario_5() {
        let cmd = SendUssd {
            text: "*100#".into(),
            charset: Charset::Gsm7,
            gsm7_hex_encode: true,
        };
        assert_eq!(cmd.command_text(), "+CUSD=1,\"AA180C3602\",15");
    }
}
