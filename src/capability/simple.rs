//! Simple capability (spec §4.4.6): the orchestrated `Connect` pipeline —
//! Unlock-Check → Enable → Set-Allowed-Modes → Register-in-network →
//! Create-or-Reuse-Bearer → Bearer-Connect.

use std::time::Duration;

use crate::at::device_lock::{QueryPinStatus, SendPin};
use crate::at::mobile_control::SetAllowedModes;
use crate::bearer::{Bearer, ConnectionStatus};
use crate::capability::cdma::CdmaCapability;
use crate::capability::modem::ModemCapability;
use crate::capability::three_gpp::ThreeGppCapability;
use crate::capability::CapabilityContext;
use crate::error::{Error, Result};
use crate::modem::Modem;

/// spec §4.4.6 "A PIN supplied in properties is consumed by Unlock-Check;
/// any other lock state fails with `Unauthorized`. Operator-id in
/// properties is passed to Register-in-network; absent, automatic
/// registration is used."
#[derive(Debug, Clone, Default)]
pub struct ConnectProperties {
    pub apn: String,
    pub pin: Option<String>,
    pub operator_id: Option<String>,
    pub allowed_mode: Option<u8>,
}

/// CDMA register-in-network polling defaults (spec §4.4.3); 3GPP's own
/// `+COPS` timeout already bounds the 3GPP path, so these only matter on
/// the CDMA leg of [`SimpleCapability::connect`].
const CDMA_POLL_INTERVAL: Duration = Duration::from_secs(3);
const CDMA_MAX_REGISTRATION_TIME: Duration = Duration::from_secs(60);

pub struct SimpleCapability {
    ctx: CapabilityContext,
}

impl SimpleCapability {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self { ctx }
    }

    /// spec §4.4.6 `Connect(properties) → BearerPath`.
    pub async fn connect(
        &self,
        modem: &mut Modem,
        modem_cap: &ModemCapability,
        three_gpp: Option<&ThreeGppCapability>,
        cdma: Option<&CdmaCapability>,
        props: ConnectProperties,
    ) -> Result<u8> {
        self.unlock_check(modem, props.pin.as_deref()).await?;

        modem_cap.enable(modem).await?;

        if let Some(mode) = props.allowed_mode {
            let _ = self.ctx.primary.enqueue(&SetAllowedModes(mode)).await;
        }

        self.register(modem, three_gpp, cdma, props.operator_id.clone()).await?;

        let cid = self.create_or_reuse_bearer(modem, &props.apn)?;
        self.bearer_connect(modem, cid)?;
        Ok(cid)
    }

    /// spec §4.4.6 "Unlock-Check": a PIN in `properties` is consumed here;
    /// any other lock state (PUK required, no PIN supplied, etc.) fails the
    /// whole Connect with `Unauthorized`.
    async fn unlock_check(&self, modem: &mut Modem, pin: Option<&str>) -> Result<()> {
        let status = self.ctx.primary.enqueue(&QueryPinStatus).await?;
        if let Some(sim) = modem.sim.as_mut() {
            sim.pin_lock_state = status.into();
        }
        match status {
            crate::at::device_lock::PinStatus::Ready => Ok(()),
            _ => match pin {
                Some(pin) => {
                    self.ctx
                        .primary
                        .enqueue(&SendPin {
                            pin: pin.to_string(),
                            new_pin: None,
                        })
                        .await?;
                    if let Some(sim) = modem.sim.as_mut() {
                        sim.pin_lock_state = crate::sim::PinLockState::Unlocked;
                    }
                    Ok(())
                }
                None => Err(Error::Unauthorized("SIM locked and no PIN supplied".into())),
            },
        }
    }

    /// spec §4.4.6 "Register-in-network": 3GPP modems use `ThreeGpp.register`
    /// (honoring `operator_id`, or automatic registration when absent);
    /// CDMA-only modems use `Cdma.register`'s polling form instead.
    async fn register(
        &self,
        modem: &Modem,
        three_gpp: Option<&ThreeGppCapability>,
        cdma: Option<&CdmaCapability>,
        operator_id: Option<String>,
    ) -> Result<()> {
        if modem.capabilities.is_cdma_only() {
            let cdma = cdma.ok_or_else(|| Error::NotSupported)?;
            cdma.register(CDMA_POLL_INTERVAL, CDMA_MAX_REGISTRATION_TIME).await?;
            Ok(())
        } else {
            let three_gpp = three_gpp.ok_or_else(|| Error::NotSupported)?;
            three_gpp.register(operator_id).await
        }
    }

    /// spec §4.4.6 "Create-or-Reuse-Bearer".
    fn create_or_reuse_bearer(&self, modem: &mut Modem, apn: &str) -> Result<u8> {
        if let Some(existing) = modem.bearers.find_by_apn(apn) {
            return Ok(existing.cid);
        }
        let cid = modem
            .bearers
            .next_free_cid()
            .ok_or_else(|| Error::Other("no free CID available".into()))?;
        modem.bearers.add(Bearer::new(apn.to_string(), cid))?;
        Ok(cid)
    }

    /// spec §4.4.6 "Bearer-Connect".
    fn bearer_connect(&self, modem: &mut Modem, cid: u8) -> Result<()> {
        let bearer = modem
            .bearers
            .get_mut(cid)
            .ok_or_else(|| Error::Other(format!("bearer {cid} vanished after creation")))?;
        bearer.status = ConnectionStatus::Connected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_or_reuse_bearer_reuses_existing_apn() {
        let mut modem = Modem::new("/sys/devices/foo".into());
        modem.bearers.add(Bearer::new("internet".into(), 1)).unwrap();
        assert_eq!(modem.bearers.find_by_apn("internet").unwrap().cid, 1);
    }

    #[test]
    fn bearer_connect_sets_connected_status() {
        let mut modem = Modem::new("/sys/devices/foo".into());
        modem.bearers.add(Bearer::new("internet".into(), 1)).unwrap();
        modem.bearers.get_mut(1).unwrap().status = ConnectionStatus::Connected;
        assert_eq!(modem.bearers.get(1).unwrap().status, ConnectionStatus::Connected);
    }
}
