//! SMS data model and multipart reassembly (spec §3 `SmsPart`/`Sms`,
//! §4.4.4 "Multipart reassembly").

use std::collections::HashMap;

use crate::at::messaging::{SmsState, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PduType {
    Deliver,
    Submit,
    StatusReport,
    Unknown,
}

/// A multipart concatenated-SMS descriptor: `(reference, total, sequence)`
/// (spec §3 `SmsPart`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultipartDescriptor {
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

/// spec §3 `SmsPart`.
#[derive(Debug, Clone)]
pub struct SmsPart {
    pub storage: Storage,
    pub index: u32,
    pub pdu_type: PduType,
    pub state: SmsState,
    pub number: String,
    pub timestamp: Option<String>,
    pub text: String,
    pub raw_ucs2: Vec<u8>,
    pub class: Option<u8>,
    pub multipart: Option<MultipartDescriptor>,
}

/// spec §3 `Sms`: one or more parts sharing a `reference`/`total`.
#[derive(Debug, Clone)]
pub struct Sms {
    pub parts: Vec<SmsPart>,
}

impl Sms {
    /// Complete iff every part `1..=total` for the shared reference has
    /// arrived (spec §3 "An Sms is complete iff all `total` parts are
    /// present").
    pub fn is_complete(&self) -> bool {
        let Some(first) = self.parts.first() else {
            return false;
        };
        match first.multipart {
            None => self.parts.len() == 1,
            Some(desc) => self.parts.len() as u8 == desc.total,
        }
    }

    pub fn text(&self) -> String {
        let mut ordered = self.parts.clone();
        ordered.sort_by_key(|p| p.multipart.map(|d| d.sequence).unwrap_or(1));
        ordered.into_iter().map(|p| p.text).collect()
    }
}

/// Open Question 4: the max stored parts per multipart message is
/// unbounded in the original source; this crate imposes 255, matching the
/// TP-UDH `total`/`sequence` fields' single-octet range so a corrupt or
/// adversarial `total` can never grow a reassembly entry past what the PDU
/// format itself could ever declare.
pub const MAX_MULTIPART_PARTS: u8 = 255;

#[derive(Debug, Default)]
struct ReassemblyEntry {
    parts: Vec<SmsPart>,
}

/// Keyed by `(sender, reference, total)` (spec §4.4.4 "Multipart
/// reassembly"). A completed message is emitted once `count == total`; a
/// partial message is kept indefinitely, since it mirrors state that lives
/// in modem storage and therefore survives a daemon restart.
#[derive(Debug, Default)]
pub struct ReassemblyTable {
    entries: HashMap<(String, u16, u8), ReassemblyEntry>,
}

impl ReassemblyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `part` to its reassembly slot, returning the completed [`Sms`]
    /// if this was the last missing part.
    pub fn insert(&mut self, sender: String, part: SmsPart) -> Option<Sms> {
        let Some(desc) = part.multipart else {
            return Some(Sms { parts: vec![part] });
        };
        let total = desc.total.min(MAX_MULTIPART_PARTS);

        let key = (sender, desc.reference, total);
        let entry = self.entries.entry(key.clone()).or_default();
        if !entry.parts.iter().any(|p| p.multipart == Some(desc)) {
            entry.parts.push(part);
        }

        if entry.parts.len() as u8 >= total {
            let entry = self.entries.remove(&key).unwrap();
            Some(Sms { parts: entry.parts })
        } else {
            None
        }
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(seq: u8, total: u8, reference: u16) -> SmsPart {
        SmsPart {
            storage: Storage::Sm,
            index: seq as u32,
            pdu_type: PduType::Deliver,
            state: SmsState::Received,
            number: "+15551234567".into(),
            timestamp: None,
            text: seq.to_string(),
            raw_ucs2: Vec::new(),
            class: None,
            multipart: Some(MultipartDescriptor {
                reference,
                total,
                sequence: seq,
            }),
        }
    }

    #[test]
    fn single_part_message_is_complete_immediately() {
        let mut table = ReassemblyTable::new();
        let p = SmsPart {
            multipart: None,
            ..part(1, 1, 1)
        };
        let sms = table.insert("+1555".into(), p).unwrap();
        assert!(sms.is_complete());
    }

    #[test]
    fn multipart_message_assembles_only_once_all_parts_present() {
        let mut table = ReassemblyTable::new();
        assert!(table.insert("+1555".into(), part(1, 3, 42)).is_none());
        assert!(table.insert("+1555".into(), part(2, 3, 42)).is_none());
        assert_eq!(table.pending_count(), 1);
        let sms = table.insert("+1555".into(), part(3, 3, 42)).unwrap();
        assert!(sms.is_complete());
        assert_eq!(sms.text(), "123");
    }

    #[test]
    fn duplicate_part_is_not_double_counted() {
        let mut table = ReassemblyTable::new();
        table.insert("+1555".into(), part(1, 2, 7));
        table.insert("+1555".into(), part(1, 2, 7));
        assert_eq!(table.pending_count(), 1);
        let sms = table.insert("+1555".into(), part(2, 2, 7)).unwrap();
        assert_eq!(sms.parts.len(), 2);
    }

    #[test]
    fn total_is_clamped_to_255_bound() {
        let mut table = ReassemblyTable::new();
        let p = part(1, 255, 9);
        table.insert("+1555".into(), p);
        assert_eq!(table.pending_count(), 1);
    }
}
