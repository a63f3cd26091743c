//! Dialect framers: turn a byte stream into delimited [`PortFrame`]s
//! (spec §3 `PortFrame`, §4.1 "Framer policy").

use crc::{Crc, CRC_16_IBM_SDLC};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    At,
    Qcdm,
}

/// Accumulates bytes into `\r\n`-terminated AT frames, suppressing command
/// echo and swallowing empty frames (spec §4.1).
#[derive(Debug, Default)]
pub struct AtFramer {
    buf: Vec<u8>,
    /// Bytes of the command currently outstanding, used for the two-pass
    /// echo match against leading bytes on devices that don't honor `ATE0`.
    outstanding_echo: Option<Vec<u8>>,
}

impl AtFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call before writing a command so a late echo can be stripped.
    pub fn expect_echo(&mut self, command_bytes: &[u8]) {
        self.outstanding_echo = Some(command_bytes.to_vec());
    }

    /// Feed newly-read bytes; returns any complete frames found.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            let Some(pos) = find_subslice(&self.buf, b"\r\n") else {
                break;
            };
            let mut line: Vec<u8> = self.buf.drain(..pos).collect();
            // drop the \r\n terminator itself
            self.buf.drain(..2);

            if let Some(echo) = &self.outstanding_echo {
                if line.starts_with(echo) {
                    line.drain(..echo.len());
                    self.outstanding_echo = None;
                }
            }

            if line.is_empty() {
                continue; // empty frames are swallowed, never surfaced
            }
            frames.push(line);
        }

        // `+CMGS`'s "enter PDU body" prompt (3GPP TS 27.005 §3.5) is the one
        // AT frame with no trailing CRLF of its own; surface it once seen
        // rather than waiting forever for a terminator that never comes.
        if self.buf == b"> " {
            frames.push(std::mem::take(&mut self.buf));
        }

        frames
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

const CCITT_FALSE: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Byte-stuffs a raw QCDM payload and appends its CRC-16/CCITT and the
/// trailing `0x7E` delimiter (spec §4.1, §6 "QCDM wire format").
pub fn encapsulate(payload: &[u8]) -> Vec<u8> {
    let crc = CCITT_FALSE.checksum(payload);
    let mut with_crc = payload.to_vec();
    with_crc.extend_from_slice(&crc.to_le_bytes());

    let mut out = Vec::with_capacity(with_crc.len() + 2);
    for &b in &with_crc {
        match b {
            0x7E => {
                out.push(0x7D);
                out.push(0x5E);
            }
            0x7D => {
                out.push(0x7D);
                out.push(0x5D);
            }
            _ => out.push(b),
        }
    }
    out.push(0x7E);
    out
}

/// Inverse of [`encapsulate`]: un-stuffs and CRC-checks a single HDLC
/// frame (delimiter already stripped by [`HdlcFramer`]).
pub fn decapsulate(frame: &[u8]) -> crate::error::Result<Vec<u8>> {
    let mut unstuffed = Vec::with_capacity(frame.len());
    let mut iter = frame.iter().copied();
    while let Some(b) = iter.next() {
        if b == 0x7D {
            match iter.next() {
                Some(0x5E) => unstuffed.push(0x7E),
                Some(0x5D) => unstuffed.push(0x7D),
                _ => {
                    return Err(crate::error::Error::ParseError(
                        "invalid QCDM byte-stuffing escape".into(),
                    ))
                }
            }
        } else {
            unstuffed.push(b);
        }
    }

    if unstuffed.len() < 2 {
        return Err(crate::error::Error::ParseError(
            "QCDM frame shorter than its CRC".into(),
        ));
    }
    let split_at = unstuffed.len() - 2;
    let (payload, crc_bytes) = unstuffed.split_at(split_at);
    let want = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let got = CCITT_FALSE.checksum(payload);
    if want != got {
        return Err(crate::error::Error::ParseError(format!(
            "QCDM CRC mismatch: frame={want:#06x} computed={got:#06x}"
        )));
    }
    Ok(payload.to_vec())
}

/// Splits a raw byte stream on `0x7E` delimiters into candidate HDLC
/// frames, then un-stuffs/CRC-checks each (spec §4.1).
#[derive(Debug, Default)]
pub struct HdlcFramer {
    buf: Vec<u8>,
}

impl HdlcFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly-read bytes; returns `Ok` frames for valid ones and logs
    /// (via `tracing`) and drops corrupt ones, per spec §4.1.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == 0x7E) {
            let candidate: Vec<u8> = self.buf.drain(..=pos).collect();
            let raw = &candidate[..candidate.len() - 1]; // drop trailing 0x7E
            if raw.is_empty() {
                continue; // a bare 0x7E separator between frames
            }
            match decapsulate(raw) {
                Ok(payload) => frames.push(payload),
                Err(e) => tracing::warn!(error = %e, "dropping corrupt QCDM frame"),
            }
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_framer_splits_on_crlf_and_drops_empty_frames() {
        let mut f = AtFramer::new();
        let frames = f.feed(b"\r\nOK\r\n\r\n+CREG: 1,\"1A2B\"\r\n");
        assert_eq!(frames, vec![b"OK".to_vec(), b"+CREG: 1,\"1A2B\"".to_vec()]);
    }

    #[test]
    fn at_framer_surfaces_the_cmgs_prompt_with_no_crlf() {
        let mut f = AtFramer::new();
        let frames = f.feed(b"\r\n> ");
        assert_eq!(frames, vec![b"> ".to_vec()]);
    }

    #[test]
    fn at_framer_strips_command_echo() {
        let mut f = AtFramer::new();
        f.expect_echo(b"AT+CSQ");
        let frames = f.feed(b"AT+CSQ\r\n+CSQ: 20,99\r\nOK\r\n");
        assert_eq!(frames, vec![b"+CSQ: 20,99".to_vec(), b"OK".to_vec()]);
    }

    #[test]
    fn r3_qcdm_round_trip() {
        let payload = vec![0x00, 0x7E, 0x01, 0x7D, 0x02];
        let encoded = encapsulate(&payload);
        assert_eq!(*encoded.last().unwrap(), 0x7E);
        let mut framer = HdlcFramer::new();
        let frames = framer.feed(&encoded);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], payload);
    }

    #[test]
    fn corrupt_qcdm_frame_is_dropped_not_panicking() {
        let mut payload = encapsulate(&[1, 2, 3]);
        // flip a byte inside the frame (not the trailing delimiter) to break the CRC
        let n = payload.len();
        payload[n - 3] ^= 0xFF;
        let mut framer = HdlcFramer::new();
        let frames = framer.feed(&payload);
        assert!(frames.is_empty());
    }
}
