//! SMS-DELIVER TPDU decoding (spec §4.4.4 "parse the PDU"), the one piece
//! `at::messaging` leaves to the Messaging capability since it works on
//! already-framed hex strings rather than AT response lines.
//!
//! Grounded on 3GPP TS 23.040 §9.2's SMS-DELIVER layout; the semi-octet
//! address/timestamp decoding and UDH-concatenation handling follow the
//! shape of `other_examples`' `huawei-modem` `pdu` module (`DeliverPdu`),
//! reimplemented against this crate's own [`crate::charset`] helpers rather
//! than carrying that crate's own bit-level primitives over verbatim.

use crate::charset::{decode_ucs2_hex, gsm7_pack, gsm7_unpack, hex_decode, hex_encode};
use crate::error::{Error, Result};
use crate::sms::MultipartDescriptor;

/// A decoded SMS-DELIVER TPDU (spec §3 `SmsPart`'s PDU-derived fields).
#[derive(Debug, Clone)]
pub struct DecodedDeliver {
    pub sender: String,
    pub timestamp: String,
    pub text: String,
    pub class: Option<u8>,
    pub multipart: Option<MultipartDescriptor>,
}

/// Decodes a hex-encoded SMS-DELIVER TPDU, including the leading SMSC
/// address octet group `+CMGL`/`+CMGR` prepend (TS 23.040 §9.2.3.1).
pub fn decode_deliver_pdu(pdu_hex: &str) -> Result<DecodedDeliver> {
    let bytes = hex_decode(pdu_hex)?;
    let mut pos = 0usize;

    let smsc_len = read_u8(&bytes, pos)?;
    pos += 1 + smsc_len as usize;

    let first_octet = read_u8(&bytes, pos)?;
    pos += 1;
    let has_udh = first_octet & 0b0100_0000 != 0;

    let sender_len_digits = read_u8(&bytes, pos)? as usize;
    pos += 1;
    let sender_type = read_u8(&bytes, pos)?;
    pos += 1;
    let sender_octets = sender_len_digits.div_ceil(2);
    let sender_digits = decode_semi_octets(slice(&bytes, pos, sender_octets)?, sender_len_digits);
    pos += sender_octets;
    let sender = if sender_type & 0x70 == 0x50 {
        // alphanumeric (GSM7-packed) originating address, TS 23.040 §9.1.2.5
        sender_digits
    } else {
        format!("+{sender_digits}")
    };

    let _protocol_id = read_u8(&bytes, pos)?;
    pos += 1;
    let dcs = read_u8(&bytes, pos)?;
    pos += 1;

    let timestamp = decode_timestamp(slice(&bytes, pos, 7)?);
    pos += 7;

    let ud_len = read_u8(&bytes, pos)? as usize;
    pos += 1;
    let ud = &bytes[pos..];

    let (class, is_ucs2, is_8bit) = decode_dcs(dcs);

    let (multipart, text) = if has_udh {
        let udh_len = read_u8(ud, 0)? as usize;
        let udh = slice(ud, 1, udh_len)?;
        let body = &ud[1 + udh_len..];
        let multipart = parse_concat_udh(udh);
        let text = decode_body(body, ud_len, udh_len, is_ucs2, is_8bit)?;
        (multipart, text)
    } else {
        (None, decode_body(ud, ud_len, 0, is_ucs2, is_8bit)?)
    };

    Ok(DecodedDeliver {
        sender,
        timestamp,
        text,
        class,
        multipart,
    })
}

/// A decoded SMS-STATUS-REPORT TPDU (spec §4.4.4 "On `+CDS`: parse the
/// inline PDU").
#[derive(Debug, Clone)]
pub struct DecodedStatusReport {
    pub recipient: String,
    pub service_centre_timestamp: String,
    pub discharge_timestamp: String,
    pub status: u8,
}

/// Decodes a hex-encoded SMS-STATUS-REPORT TPDU (TS 23.040 §9.2.2.3) — a
/// different TPDU shape from SMS-DELIVER's: a recipient address rather
/// than an originating one, and two timestamps (service-centre submission,
/// discharge) in place of the one SMS-DELIVER carries.
pub fn decode_status_report_pdu(pdu_hex: &str) -> Result<DecodedStatusReport> {
    let bytes = hex_decode(pdu_hex)?;
    let mut pos = 0usize;

    let smsc_len = read_u8(&bytes, pos)?;
    pos += 1 + smsc_len as usize;

    let _first_octet = read_u8(&bytes, pos)?;
    pos += 1;
    let _message_reference = read_u8(&bytes, pos)?;
    pos += 1;

    let recipient_len_digits = read_u8(&bytes, pos)? as usize;
    pos += 1;
    let recipient_type = read_u8(&bytes, pos)?;
    pos += 1;
    let recipient_octets = recipient_len_digits.div_ceil(2);
    let recipient_digits = decode_semi_octets(slice(&bytes, pos, recipient_octets)?, recipient_len_digits);
    pos += recipient_octets;
    let recipient = if recipient_type & 0x70 == 0x50 {
        recipient_digits
    } else {
        format!("+{recipient_digits}")
    };

    let service_centre_timestamp = decode_timestamp(slice(&bytes, pos, 7)?);
    pos += 7;
    let discharge_timestamp = decode_timestamp(slice(&bytes, pos, 7)?);
    pos += 7;

    let status = read_u8(&bytes, pos)?;

    Ok(DecodedStatusReport {
        recipient,
        service_centre_timestamp,
        discharge_timestamp,
        status,
    })
}

/// Encodes `text` addressed to `number` as an SMS-SUBMIT TPDU (TS 23.040
/// §9.2.2.2), GSM7-only and with no validity period, UDH, or status-report
/// request — this crate's `send` only ever submits single-part plaintext.
/// Returns the SMSC-prefixed PDU hex the `+CMGS` body line carries, and the
/// TPDU octet length (SMSC octets excluded) its header argument wants.
pub fn encode_submit_pdu(number: &str, text: &str) -> Result<(String, usize)> {
    let (digits, type_octet) = match number.strip_prefix('+') {
        Some(rest) => (rest, 0x91u8),
        None => (number, 0x81u8),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::ParseError(format!("invalid destination address: {number}")));
    }

    let mut tpdu = Vec::new();
    tpdu.push(0x01); // TP-MTI = SMS-SUBMIT, no VP/UDH/SRR/RP requested
    tpdu.push(0x00); // TP-MR: let the modem assign the message reference
    tpdu.push(digits.len() as u8);
    tpdu.push(type_octet);
    tpdu.extend(encode_semi_octets(digits));
    tpdu.push(0x00); // TP-PID
    tpdu.push(0x00); // TP-DCS: GSM7 default alphabet, no class
    let packed = gsm7_pack(text)?;
    tpdu.push(text.chars().count() as u8); // TP-UDL: septet count
    tpdu.extend(packed);

    let tpdu_octet_len = tpdu.len();
    let mut full = vec![0x00]; // SMSC length 0: use the modem's configured default
    full.extend(tpdu);
    Ok((hex_encode(&full), tpdu_octet_len))
}

/// Inverse of [`decode_semi_octets`]: packs decimal digits two per octet,
/// low nibble first, padding an odd final digit with `0xF`.
fn encode_semi_octets(digits: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    let mut chars = digits.chars();
    while let Some(lo) = chars.next() {
        let lo = lo.to_digit(10).unwrap_or(0) as u8;
        let hi = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
            .unwrap_or(0x0F);
        out.push((hi << 4) | lo);
    }
    out
}

fn decode_body(body: &[u8], ud_len: usize, udh_len_with_marker: usize, is_ucs2: bool, is_8bit: bool) -> Result<String> {
    if is_ucs2 {
        Ok(decode_ucs2_hex(&crate::charset::hex_encode(body))?)
    } else if is_8bit {
        Ok(String::from_utf8_lossy(body).to_string())
    } else {
        // ud_len counts septets over the whole UD including the UDH; the UDH
        // consumes ceil((udh_len_with_marker+1)*8/7) septets of that budget.
        let udh_septets = if udh_len_with_marker == 0 {
            0
        } else {
            ((udh_len_with_marker + 1) * 8).div_ceil(7)
        };
        let septet_count = ud_len.saturating_sub(udh_septets);
        Ok(gsm7_unpack(body, septet_count))
    }
}

/// TS 23.040 §9.2.3.24: DCS bits 7-4 = 0000 means the default alphabet
/// unless bit 2 is set (8-bit data); `00001xxx`-family values select UCS2.
fn decode_dcs(dcs: u8) -> (Option<u8>, bool, bool) {
    if dcs & 0b1100_0000 == 0 {
        let is_8bit = dcs & 0b0000_0100 != 0;
        let is_ucs2 = dcs & 0b0000_1000 != 0;
        let class = if dcs & 0b0001_0000 != 0 {
            Some(dcs & 0b0000_0011)
        } else {
            None
        };
        (class, is_ucs2, is_8bit)
    } else {
        (None, false, false)
    }
}

/// TS 23.040 §9.2.3.24.1: IE 0x00, concatenated short message, 8-bit
/// reference.
fn parse_concat_udh(udh: &[u8]) -> Option<MultipartDescriptor> {
    let mut i = 0;
    while i + 1 < udh.len() {
        let ie_id = udh[i];
        let ie_len = udh[i + 1] as usize;
        let ie_data = udh.get(i + 2..i + 2 + ie_len)?;
        if ie_id == 0x00 && ie_len == 3 {
            return Some(MultipartDescriptor {
                reference: ie_data[0] as u16,
                total: ie_data[1],
                sequence: ie_data[2],
            });
        }
        if ie_id == 0x08 && ie_len == 4 {
            return Some(MultipartDescriptor {
                reference: u16::from_be_bytes([ie_data[0], ie_data[1]]),
                total: ie_data[2],
                sequence: ie_data[3],
            });
        }
        i += 2 + ie_len;
    }
    None
}

fn decode_semi_octets(bytes: &[u8], digit_count: usize) -> String {
    let mut out = String::with_capacity(digit_count);
    for &b in bytes {
        out.push(nibble_to_digit(b & 0x0F));
        if out.len() < digit_count {
            out.push(nibble_to_digit(b >> 4));
        }
    }
    out.truncate(digit_count);
    out
}

fn nibble_to_digit(n: u8) -> char {
    match n {
        0..=9 => (b'0' + n) as char,
        _ => '?',
    }
}

/// TS 23.040 §9.2.3.11: year, month, day, hour, minute, second, timezone —
/// all semi-octet swapped, quarter-hour timezone offset.
fn decode_timestamp(bytes: &[u8]) -> String {
    let field = |b: u8| format!("{}{}", b & 0x0F, b >> 4);
    format!(
        "{}-{}-{}T{}:{}:{}",
        field(bytes[0]),
        field(bytes[1]),
        field(bytes[2]),
        field(bytes[3]),
        field(bytes[4]),
        field(bytes[5]),
    )
}

fn read_u8(bytes: &[u8], pos: usize) -> Result<u8> {
    bytes
        .get(pos)
        .copied()
        .ok_or_else(|| Error::ParseError("PDU truncated".into()))
}

fn slice(bytes: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    bytes
        .get(pos..pos + len)
        .ok_or_else(|| Error::ParseError("PDU truncated".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_part_gsm7_deliver() {
        // SMSC omitted (len 0), sender "1234567", no UDH, GSM7 "hi" body.
        let pdu = "00040791214365F700001210102103000002E834";
        let decoded = decode_deliver_pdu(pdu).unwrap();
        assert_eq!(decoded.sender, "+1234567");
        assert_eq!(decoded.timestamp, "21-01-01T12:30:00");
        assert_eq!(decoded.text, "hi");
        assert_eq!(decoded.multipart, None);
        assert_eq!(decoded.class, None);
    }

    #[test]
    fn decodes_status_report_pdu() {
        let pdu = "0002010B915155214365F7121010210300001210102103500000";
        let decoded = decode_status_report_pdu(pdu).unwrap();
        assert_eq!(decoded.recipient, "+15551234567");
        assert_eq!(decoded.service_centre_timestamp, "21-01-01T12:30:00");
        assert_eq!(decoded.discharge_timestamp, "21-01-01T12:30:05");
        assert_eq!(decoded.status, 0);
    }

    #[test]
    fn encode_submit_pdu_round_trips_through_decode_semantics() {
        let (pdu_hex, tpdu_len) = encode_submit_pdu("+15551234567", "hi").unwrap();
        // SMSC octet (1) + first octet + MR + DA len + DA type + 6 DA octets
        // + PID + DCS + UDL + 2 body octets ("hi" packs to 2 octets).
        assert_eq!(tpdu_len, 1 + 1 + 1 + 1 + 6 + 1 + 1 + 1 + 2);
        assert_eq!(&pdu_hex[..2], "00"); // SMSC length
        assert_eq!(&pdu_hex[2..4], "01"); // TP-MTI = SUBMIT
    }

    #[test]
    fn encode_submit_pdu_rejects_non_numeric_destination() {
        assert!(encode_submit_pdu("not-a-number", "hi").is_err());
    }

    #[test]
    fn decodes_concat_udh_reference() {
        let udh = [0x00, 0x03, 0x2A, 0x02, 0x01];
        let desc = parse_concat_udh(&udh).unwrap();
        assert_eq!(desc.reference, 0x2A);
        assert_eq!(desc.total, 2);
        assert_eq!(desc.sequence, 1);
    }

    #[test]
    fn dcs_default_alphabet_has_no_class_by_default() {
        let (class, is_ucs2, is_8bit) = decode_dcs(0x00);
        assert_eq!(class, None);
        assert!(!is_ucs2);
        assert!(!is_8bit);
    }

    #[test]
    fn dcs_ucs2_bit_is_detected() {
        let (_, is_ucs2, _) = decode_dcs(0b0000_1000);
        assert!(is_ucs2);
    }
}
