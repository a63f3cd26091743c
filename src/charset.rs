//! Charset encode/decode (spec §3 Modem `current-charset`, §6 "Supported
//! charsets", §4.4.2 USSD encode/decode, invariants R1/R2).
//!
//! GSM7 packing/unpacking and the default alphabet table are grounded on
//! the well-known 3GPP TS 23.038 tables; UCS2 is transported hex-encoded
//! per spec §6 ("the modem's response may be hex-encoded UCS-2, which the
//! core decodes").

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Charset {
    Gsm7,
    Ucs2,
    Ira,
    Utf8,
    Unknown,
}

impl Charset {
    pub fn at_name(&self) -> &'static str {
        match self {
            Charset::Gsm7 => "GSM",
            Charset::Ucs2 => "UCS2",
            Charset::Ira => "IRA",
            Charset::Utf8 => "UTF-8",
            Charset::Unknown => "",
        }
    }

    pub fn from_at_name(s: &str) -> Charset {
        match s.trim().trim_matches('"') {
            "GSM" => Charset::Gsm7,
            "UCS2" => Charset::Ucs2,
            "IRA" => Charset::Ira,
            "UTF-8" | "UTF8" => Charset::Utf8,
            _ => Charset::Unknown,
        }
    }
}

/// 3GPP TS 23.038 default alphabet, index = GSM7 septet value.
const GSM7_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', 'Δ', '_',
    'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\x1b', 'Æ', 'æ', 'ß', 'É', ' ', '!', '"', '#',
    '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', '0', '1', '2', '3', '4', '5',
    '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k',
    'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ',
    'ü', 'à',
];

fn gsm7_char_to_septet(c: char) -> Option<u8> {
    GSM7_BASIC.iter().position(|&g| g == c).map(|i| i as u8)
}

/// Packs GSM7 septets into octets (7 septets -> 7 octets with bit-shifting,
/// per 3GPP TS 23.038 §6.1.2.1).
pub fn gsm7_pack(text: &str) -> crate::error::Result<Vec<u8>> {
    let septets: Vec<u8> = text
        .chars()
        .map(|c| {
            gsm7_char_to_septet(c)
                .ok_or_else(|| crate::error::Error::ParseError(format!("char '{c}' not in GSM7 alphabet")))
        })
        .collect::<crate::error::Result<_>>()?;

    let mut packed = Vec::new();
    let mut acc: u16 = 0;
    let mut bits = 0u32;
    for s in septets {
        acc |= (s as u16) << bits;
        bits += 7;
        if bits >= 8 {
            packed.push((acc & 0xFF) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        packed.push((acc & 0xFF) as u8);
    }
    Ok(packed)
}

pub fn gsm7_unpack(bytes: &[u8], septet_count: usize) -> String {
    let mut out = String::with_capacity(septet_count);
    let mut acc: u16 = 0;
    let mut bits = 0u32;
    let mut byte_iter = bytes.iter();
    let mut produced = 0;

    while produced < septet_count {
        if bits < 7 {
            if let Some(&b) = byte_iter.next() {
                acc |= (b as u16) << bits;
                bits += 8;
            } else {
                break;
            }
        }
        let septet = (acc & 0x7F) as u8;
        acc >>= 7;
        bits -= 7;
        out.push(*GSM7_BASIC.get(septet as usize).unwrap_or(&'?'));
        produced += 1;
    }
    out
}

/// Encodes `text` as GSM7, hex-packs it, matching the `+CUSD=1,"<payload>"`
/// hex wire form (spec §4.4.2, end-to-end scenario 5).
pub fn encode_ussd_gsm7_hex(text: &str) -> crate::error::Result<String> {
    let packed = gsm7_pack(text)?;
    Ok(hex_encode(&packed))
}

pub fn decode_ussd_gsm7_hex(hex: &str, septet_count: usize) -> crate::error::Result<String> {
    let bytes = hex_decode(hex)?;
    Ok(gsm7_unpack(&bytes, septet_count))
}

/// Decodes a `+CUSD` GSM7-hex payload when no explicit septet count is
/// available (unlike SMS's `<ud_len>`, `+CUSD` carries none): derives the
/// septet count from the packed byte count, then drops a single trailing
/// `'@'` when the byte count packs to a whole number of septets with no
/// spare bits, since that last septet is pure fill (3GPP TS 23.038 §6.1.2.1)
/// rather than real content.
pub fn decode_ussd_gsm7_hex_payload(hex: &str) -> crate::error::Result<String> {
    let bytes = hex_decode(hex)?;
    let septet_count = (bytes.len() * 8) / 7;
    let mut text = gsm7_unpack(&bytes, septet_count);
    if bytes.len() % 7 == 0 && text.ends_with('@') {
        text.pop();
    }
    Ok(text)
}

/// Encodes a UTF-8 string as UCS-2 hex (big-endian code units), the form
/// UCS2-charset modems expect (spec §6).
pub fn encode_ucs2_hex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 4);
    for unit in text.encode_utf16() {
        out.push_str(&format!("{unit:04X}"));
    }
    out
}

pub fn decode_ucs2_hex(hex: &str) -> crate::error::Result<String> {
    let bytes = hex_decode(hex)?;
    if bytes.len() % 2 != 0 {
        return Err(crate::error::Error::ParseError(
            "UCS2 hex string has an odd byte length".into(),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|e| crate::error::Error::ParseError(format!("invalid UCS2: {e}")))
}

pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

pub fn hex_decode(hex: &str) -> crate::error::Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(crate::error::Error::ParseError("odd-length hex string".into()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| crate::error::Error::ParseError(format!("bad hex digit: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r1_ussd_round_trip() {
        let text = "Balance";
        let hex = encode_ussd_gsm7_hex(text).unwrap();
        let decoded = decode_ussd_gsm7_hex(&hex, text.chars().count()).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn r2_ucs2_round_trip() {
        let text = "hello";
        let hex = encode_ucs2_hex(text);
        let decoded = decode_ucs2_hex(&hex).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn ussd_gsm7_hex_payload_round_trips_without_an_explicit_length() {
        let hex = encode_ussd_gsm7_hex("Balance").unwrap();
        assert_eq!(decode_ussd_gsm7_hex_payload(&hex).unwrap(), "Balance");
    }

    #[test]
    fn ussd_scenario_5_literal_values() {
        // *100# encoded to GSM7 hex per end-to-end scenario 5.
        let hex = encode_ussd_gsm7_hex("*100#").unwrap();
        assert_eq!(hex, "AA180C3602");
    }

    #[test]
    fn charset_name_round_trips() {
        for c in [Charset::Gsm7, Charset::Ucs2, Charset::Ira, Charset::Utf8] {
            assert_eq!(Charset::from_at_name(c.at_name()), c);
        }
    }

    #[test]
    fn hex_decode_rejects_odd_length() {
        assert!(hex_decode("ABC").is_err());
    }
}
