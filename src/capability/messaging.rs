//! Messaging capability (spec §4.4.4): support/mode selection, storage
//! locking, unsolicited `+CMTI`/`+CDS` handling, initial listing, and
//! multipart reassembly.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::at::messaging::{
    EnableUnsolicitedDelivery, ListMessages, NewMessageIndicator, ProbeMessagingSupport,
    QuerySupportedModes, QuerySupportedStorages, SendMessageHeader, SetMode, SetStorages,
    SmsState, Storage,
};
use crate::capability::CapabilityContext;
use crate::error::{Error, Result};
use crate::pdu::{decode_deliver_pdu, decode_status_report_pdu, encode_submit_pdu};
use crate::sms::{MultipartDescriptor, PduType, ReassemblyTable, Sms, SmsPart};

/// RAII guard for a MEM1/MEM2 lock (spec §4.4.4 "Callers MUST release the
/// lock after the operation; dropping a lock without release is a bug" —
/// enforced here by releasing automatically on drop rather than trusting
/// every call site to remember). Invariant I6: the storage selection in
/// effect before the lock is restored when it is released, so a lock/unlock
/// cycle is transparent to whatever had MEM1/MEM2 selected beforehand.
pub struct StorageLockGuard {
    capability: Arc<MessagingCapability>,
    pre_lock: (Storage, Storage),
}

impl Drop for StorageLockGuard {
    fn drop(&mut self) {
        let capability = self.capability.clone();
        let (mem1, mem2) = self.pre_lock;
        tokio::spawn(async move {
            let _ = capability
                .ctx
                .primary
                .enqueue(&SetStorages { mem1, mem2, mem3: None })
                .await;
            *capability.mem1.lock().unwrap() = mem1;
            *capability.mem2.lock().unwrap() = mem2;
            *capability.locked.lock().unwrap() = false;
        });
    }
}

pub struct MessagingCapability {
    ctx: CapabilityContext,
    locked: Mutex<bool>,
    mem1: Mutex<Storage>,
    mem2: Mutex<Storage>,
    seen_indicators: Mutex<HashSet<(Storage, u32)>>,
    reassembly: Mutex<ReassemblyTable>,
    delivery_reports: Mutex<Vec<SmsPart>>,
}

impl MessagingCapability {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self {
            ctx,
            locked: Mutex::new(false),
            mem1: Mutex::new(Storage::Sm),
            mem2: Mutex::new(Storage::Sm),
            seen_indicators: Mutex::new(HashSet::new()),
            reassembly: Mutex::new(ReassemblyTable::new()),
            delivery_reports: Mutex::new(Vec::new()),
        }
    }

    /// spec §4.4.4 "Check support: `+CNMI=?` must succeed. CDMA-only modems
    /// are treated as unsupported."
    pub async fn is_supported(&self, is_cdma_only: bool) -> bool {
        if is_cdma_only {
            return false;
        }
        self.ctx.primary.enqueue_cached(&ProbeMessagingSupport).await.is_ok()
    }

    /// spec §4.4.4 "Preferred mode: try PDU (`+CMGF=0`); if `+CMGF=?`
    /// reports no PDU support, use text (`+CMGF=1`); if neither, default to
    /// PDU and accept errors."
    async fn select_mode(&self) -> Result<()> {
        let q = &self.ctx.primary;
        let supported = q.enqueue_cached(&QuerySupportedModes).await.unwrap_or_default();
        if supported.is_empty() || supported.contains(&0) {
            q.enqueue(&SetMode(0)).await
        } else if supported.contains(&1) {
            q.enqueue(&SetMode(1)).await
        } else {
            let _ = q.enqueue(&SetMode(0)).await;
            Ok(())
        }
    }

    /// spec §4.4.4 Enable: support check, mode selection, unsolicited
    /// registration, and an initial list for each MEM1-declared storage.
    pub async fn enable(self: &Arc<Self>, is_cdma_only: bool) -> Result<Vec<Sms>> {
        if !self.is_supported(is_cdma_only).await {
            return Ok(Vec::new());
        }
        self.select_mode().await?;
        let _ = self.ctx.primary.enqueue(&EnableUnsolicitedDelivery).await;

        let storages = self
            .ctx
            .primary
            .enqueue_cached(&QuerySupportedStorages)
            .await
            .unwrap_or_else(|_| vec![Storage::Sm]);

        let mut out = Vec::new();
        for storage in storages {
            let guard = match self.lock_storages(storage, *self.mem2.lock().unwrap()).await {
                Ok(g) => g,
                Err(_) => continue,
            };
            if let Ok(entries) = self.ctx.primary.enqueue(&ListMessages).await {
                for entry in entries {
                    if let Ok(decoded) = decode_deliver_pdu(&entry.pdu_hex) {
                        let part = SmsPart {
                            storage,
                            index: entry.index,
                            pdu_type: PduType::Deliver,
                            state: entry.state,
                            number: decoded.sender.clone(),
                            timestamp: Some(decoded.timestamp),
                            text: decoded.text,
                            raw_ucs2: Vec::new(),
                            class: decoded.class,
                            multipart: decoded.multipart,
                        };
                        if let Some(sms) = self.reassembly.lock().unwrap().insert(decoded.sender, part) {
                            out.push(sms);
                        }
                    }
                }
            }
            drop(guard);
        }
        Ok(out)
    }

    /// spec §4.4.4 `lock_storages`: a second concurrent lock attempt fails
    /// with `Retry` rather than blocking.
    pub async fn lock_storages(self: &Arc<Self>, mem1: Storage, mem2: Storage) -> Result<StorageLockGuard> {
        let pre_lock = {
            let mut locked = self.locked.lock().unwrap();
            if *locked {
                return Err(Error::Retry);
            }
            *locked = true;
            (*self.mem1.lock().unwrap(), *self.mem2.lock().unwrap())
        };
        if let Err(e) = self
            .ctx
            .primary
            .enqueue(&SetStorages { mem1, mem2, mem3: None })
            .await
        {
            *self.locked.lock().unwrap() = false;
            return Err(e);
        }
        *self.mem1.lock().unwrap() = mem1;
        *self.mem2.lock().unwrap() = mem2;
        Ok(StorageLockGuard {
            capability: self.clone(),
            pre_lock,
        })
    }

    /// spec §4.4.4 "On `+CMTI <storage>, <index>`: (a) if `(storage,
    /// index)` is already tracked, ignore; (b) otherwise lock MEM1 ...
    /// `+CMGR=<index>`, parse the PDU, attach to the SmsList with state
    /// Received, release the lock."
    pub async fn on_new_message_indicator(self: &Arc<Self>, ind: &NewMessageIndicator) -> Result<Option<Sms>> {
        let key = (ind.storage, ind.index);
        if !self.seen_indicators.lock().unwrap().insert(key) {
            return Ok(None);
        }

        let mem2 = *self.mem2.lock().unwrap();
        let guard = self.lock_storages(ind.storage, mem2).await?;
        let entry = self
            .ctx
            .primary
            .enqueue(&crate::at::messaging::ReadMessage { index: ind.index })
            .await;
        drop(guard);

        let entry = entry?;
        let decoded = decode_deliver_pdu(&entry.pdu_hex)?;
        let part = SmsPart {
            storage: ind.storage,
            index: ind.index,
            pdu_type: PduType::Deliver,
            state: crate::at::messaging::SmsState::Received,
            number: decoded.sender.clone(),
            timestamp: Some(decoded.timestamp),
            text: decoded.text,
            raw_ucs2: Vec::new(),
            class: decoded.class,
            multipart: decoded.multipart,
        };
        Ok(self.reassembly.lock().unwrap().insert(decoded.sender, part))
    }

    /// spec §4.4.4 "On `+CDS`: parse the inline PDU; never touch storage."
    pub fn on_delivery_status_report(&self, pdu_hex: &str) -> Result<()> {
        let decoded = decode_status_report_pdu(pdu_hex)?;
        self.delivery_reports.lock().unwrap().push(SmsPart {
            storage: Storage::Sr,
            index: 0,
            pdu_type: PduType::StatusReport,
            state: SmsState::Received,
            number: decoded.recipient,
            timestamp: Some(decoded.discharge_timestamp),
            text: String::new(),
            raw_ucs2: Vec::new(),
            class: None,
            multipart: None,
        });
        Ok(())
    }

    /// Drains the status reports accumulated since the last call (spec
    /// §4.4.4 "never touch storage" — these live only in this in-memory
    /// list, there is no `+CMGL`-style re-fetch for them).
    pub fn take_delivery_reports(&self) -> Vec<SmsPart> {
        std::mem::take(&mut self.delivery_reports.lock().unwrap())
    }

    pub fn pending_multipart_count(&self) -> usize {
        self.reassembly.lock().unwrap().pending_count()
    }

    /// spec §4.4.4 "Send-SMS": encode `text` to `number` as an SMS-SUBMIT
    /// PDU and drive `+CMGS`'s two-phase exchange to completion.
    pub async fn send(&self, number: &str, text: &str) -> Result<()> {
        let (pdu_hex, tpdu_len) = encode_submit_pdu(number, text)?;
        let header = SendMessageHeader { pdu_octet_len: tpdu_len }.command_text();
        self.ctx.primary.enqueue_sms_submit(&header, &pdu_hex).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_dedup_set_ignores_repeats() {
        let mut seen: HashSet<(Storage, u32)> = HashSet::new();
        assert!(seen.insert((Storage::Sm, 3)));
        assert!(!seen.insert((Storage::Sm, 3)));
    }

    #[test]
    fn multipart_descriptor_equality_is_structural() {
        let a = MultipartDescriptor {
            reference: 1,
            total: 2,
            sequence: 1,
        };
        let b = a;
        assert_eq!(a, b);
    }
}
