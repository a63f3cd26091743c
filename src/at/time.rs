//! Network time commands (spec §4.4 Time capability, supplemented from
//! `original_source`'s `mm-iface-modem-time.c`: `+CCLK?` plus the
//! `+CTZV`/`+CIEV` time-zone URC bodies).

use super::{split_args, AtCommand};
use crate::error::{Error, Result};

/// 3GPP TS 27.007 §8.15 `+CCLK` timestamp: `yy/MM/dd,hh:mm:ss±zz`, the zone
/// already in quarter-hours like the registration-report LAC/CI fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTime {
    pub utc: String,
    pub tz_offset_minutes: Option<i32>,
}

/// `+CCLK?` — current network time (spec: Time capability's one operation).
pub struct QueryNetworkTime;

impl AtCommand for QueryNetworkTime {
    type Response = NetworkTime;

    fn command_text(&self) -> String {
        "+CCLK?".into()
    }

    fn parse(&self, lines: &[String]) -> Result<NetworkTime> {
        let line = lines
            .iter()
            .find_map(|l| super::split_response_prefix(l, "+CCLK:"))
            .ok_or_else(|| Error::ParseError("no +CCLK: line in response".into()))?;
        parse_cclk_body(line)
    }
}

/// Parses a `+CCLK:` body, shared between the query response and the
/// (identically shaped) `+CTZV` URC parser below.
pub fn parse_cclk_body(body: &str) -> Result<NetworkTime> {
    let raw = super::unquote(split_args(body).first().cloned().unwrap_or_default().as_str());
    let (datetime, tz_offset_minutes) = split_timezone(&raw);
    Ok(NetworkTime {
        utc: datetime,
        tz_offset_minutes,
    })
}

/// `+CTZV: <tz>` — bare quarter-hour timezone URC, no date/time (spec:
/// `original_source`'s time-zone-only notification).
pub fn parse_ctzv_body(body: &str) -> Option<i32> {
    body.trim().parse::<i32>().ok().map(|q| q * 15)
}

/// Splits `"yy/MM/dd,hh:mm:ss+zz"` into the datetime half and the quarter-
/// hour zone offset in minutes; a response with no `+`/`-` zone suffix
/// yields `None` for the offset rather than guessing UTC.
fn split_timezone(raw: &str) -> (String, Option<i32>) {
    for (i, c) in raw.char_indices().rev() {
        if c == '+' || c == '-' {
            let (datetime, zone) = raw.split_at(i);
            if let Ok(quarters) = zone.parse::<i32>() {
                return (datetime.to_string(), Some(quarters * 15));
            }
        }
    }
    (raw.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cclk_parses_datetime_and_quarter_hour_zone() {
        let resp = QueryNetworkTime
            .parse(&["+CCLK: \"24/01/15,10:30:00+08\"".to_string()])
            .unwrap();
        assert_eq!(resp.utc, "24/01/15,10:30:00");
        assert_eq!(resp.tz_offset_minutes, Some(120));
    }

    #[test]
    fn cclk_with_no_zone_suffix_has_no_offset() {
        let resp = QueryNetworkTime
            .parse(&["+CCLK: \"24/01/15,10:30:00\"".to_string()])
            .unwrap();
        assert_eq!(resp.tz_offset_minutes, None);
    }

    #[test]
    fn ctzv_body_converts_quarters_to_minutes() {
        assert_eq!(parse_ctzv_body("-32"), Some(-480));
    }
}
