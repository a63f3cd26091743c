//! The base Modem capability (spec §4.4.1).

use crate::at::device_lock::{PinRetries, QueryPinRetries, QueryPinStatus};
use crate::at::mobile_control::{
    self, FlowControl, QueryCapabilities, QueryEquipmentIdentifier, QueryIdentification, QueryIndicatorDescriptors,
    QueryIndicators, QueryManufacturer, QueryModel, QueryOwnNumbers, QueryRevision, QuerySignalQuality,
    QuerySupportedCharsets, QuerySupportedRadioModes, SetCharset, SetFunctionality,
};
use crate::capability::CapabilityContext;
use crate::charset::Charset;
use crate::error::Result;
use crate::modem::{CapabilityBits, Modem};

pub struct ModemCapability {
    ctx: CapabilityContext,
}

impl ModemCapability {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self { ctx }
    }

    /// spec §4.4.1 "Initialize loads, in order: ...". CDMA-only modems
    /// skip the SIM/charset/unlock steps.
    pub async fn initialize(&self, modem: &mut Modem) -> Result<()> {
        let q = &self.ctx.primary;

        if let Ok(caps) = q.enqueue_cached(&QueryCapabilities).await {
            if caps.iter().any(|c| c.contains("+CGSM") || c.contains("+FCLASS")) {
                modem.capabilities.insert(CapabilityBits::GSM_UMTS);
            }
        } else {
            let _ = q.enqueue(&QueryIdentification { variant: 0 }).await;
        }

        modem.manufacturer = q.enqueue_cached(&QueryManufacturer).await.ok();
        modem.model = q.enqueue_cached(&QueryModel).await.ok();
        modem.revision = q.enqueue_cached(&QueryRevision).await.ok();
        modem.equipment_identifier = q.enqueue_cached(&QueryEquipmentIdentifier).await.ok();

        let ati = q
            .enqueue(&QueryIdentification { variant: 0 })
            .await
            .unwrap_or_default();
        modem.device_identifier = Some(Modem::compute_device_identifier(
            &ati,
            modem.equipment_identifier.as_deref(),
        ));

        let _ = q.enqueue(&QuerySupportedRadioModes).await;

        if modem.capabilities.is_cdma_only() {
            return Ok(());
        }

        if let Ok(status) = q.enqueue(&QueryPinStatus).await {
            modem.sim.get_or_insert_with(Default::default).pin_lock_state = status.into();
        }
        modem.own_numbers = q.enqueue(&QueryOwnNumbers).await.unwrap_or_default();
        if let Ok(retries) = q.enqueue(&QueryPinRetries).await {
            modem.unlock_retries = retries;
        } else {
            modem.unlock_retries = PinRetries::default();
        }
        let _ = q.enqueue(&QuerySupportedCharsets).await;

        Ok(())
    }

    /// spec §4.4.1 "Enable performs: send init sequence ... power up ...
    /// select character set".
    pub async fn enable(&self, modem: &mut Modem) -> Result<()> {
        let q = &self.ctx.primary;

        q.enqueue(&mobile_control::RESET).await?;
        q.enqueue(&mobile_control::ECHO_OFF_VERBOSE).await?;
        q.enqueue(&mobile_control::NUMERIC_CME_ERRORS).await?;
        q.enqueue(&mobile_control::RESULT_CODE_PROFILE).await?;

        let _ = q.enqueue(&mobile_control::flow_control(FlowControl::Xon)).await;
        let _ = q.enqueue(&mobile_control::flow_control(FlowControl::Rtscts)).await;

        q.enqueue(&SetFunctionality(1)).await?;

        let supported = q.enqueue(&QuerySupportedCharsets).await.unwrap_or_default();
        let preferred = [Charset::Ucs2, Charset::Gsm7, Charset::Ira]
            .into_iter()
            .find(|c| supported.contains(c))
            .unwrap_or(Charset::Ira);
        if q.enqueue(&SetCharset(preferred)).await.is_ok() {
            modem.current_charset = preferred;
        }

        Ok(())
    }

    /// spec §4.4.1 "Disable powers down (`+CFUN=4` preferred, else
    /// `+CFUN=0`)".
    pub async fn disable(&self) -> Result<()> {
        if self.ctx.primary.enqueue(&SetFunctionality(4)).await.is_err() {
            self.ctx.primary.enqueue(&SetFunctionality(0)).await?;
        }
        Ok(())
    }

    /// spec §4.4.1 "Signal quality: prefer `+CIND?` when `+CIND=?`
    /// advertises a `signal` field, else `+CSQ`." A response shorter than
    /// the descriptor list reports "unknown" (B1); a value outside the
    /// descriptor's declared range clamps to 0 rather than its max (B3).
    pub async fn signal_quality_percent(&self) -> Result<Option<u8>> {
        let q = &self.ctx.primary;
        let descriptors = q.enqueue_cached(&QueryIndicatorDescriptors).await.unwrap_or_default();
        if let Some(pos) = descriptors.iter().position(|d| d.name == "signal") {
            let values = q.enqueue(&QueryIndicators).await?;
            let max = descriptors[pos].max;
            return Ok(values.get(pos).map(|&v| {
                let clamped = if v > max { 0 } else { v };
                if max == 0 {
                    0
                } else {
                    ((clamped as u32 * 100) / max as u32) as u8
                }
            }));
        }
        let csq = q.enqueue(&QuerySignalQuality).await?;
        Ok(csq.quality_percent())
    }
}
