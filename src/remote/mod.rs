//! Remote-object interface (spec §6 "Remote-object interface (exposed)"):
//! a `zbus`-based object exposing the Orchestrator's surface over
//! `org.freedesktop.ModemManager1`-shaped interfaces. Bus name ownership
//! and activation are the embedding binary's job — this module only
//! implements the object model, the same scoping spec.md draws around
//! `libmm-glib`/`src` versus `mmcli`/`ModemManager.service`.
//!
//! Grounded on the *consumer*-side shape visible in
//! `examples/catacombing-epitaph/src/dbus/modem_manager.rs`'s `#[proxy]`
//! trait definitions (interface names, method/property naming). The
//! provider-side `#[zbus::interface]` macro has no counterpart in the
//! retrieved pack; each D-Bus interface below is its own thin struct
//! (`zbus::Interface` can only be derived once per type) sharing the same
//! `Arc<ModemOrchestrator>`, all attached to one object path by
//! [`register_modem`].

use std::collections::HashMap;
use std::sync::Arc;

use zbus::interface;
use zbus::zvariant::OwnedValue;

use crate::at::network_service::ScannedOperator;
use crate::capability::simple::ConnectProperties;
use crate::error::{Error, ErrorKind};
use crate::orchestrator::ModemOrchestrator;

fn to_fdo_error(e: Error) -> zbus::fdo::Error {
    match e.kind() {
        ErrorKind::NotSupported => zbus::fdo::Error::NotSupported(e.to_string()),
        ErrorKind::Unauthorized => zbus::fdo::Error::AccessDenied(e.to_string()),
        ErrorKind::Timeout => zbus::fdo::Error::Timeout(e.to_string()),
        _ => zbus::fdo::Error::Failed(e.to_string()),
    }
}

/// Reads `apn`/`pin`/`operator-id`/`allowed-mode` keys out of a `Connect`
/// call's property dictionary, the same loosely-typed `a{sv}` shape the
/// consumer-side proxies use for `Simple.Connect`.
fn connect_properties_from_dict(dict: &HashMap<String, OwnedValue>) -> ConnectProperties {
    ConnectProperties {
        apn: dict
            .get("apn")
            .and_then(|v| String::try_from(v.clone()).ok())
            .unwrap_or_default(),
        pin: dict.get("pin").and_then(|v| String::try_from(v.clone()).ok()),
        operator_id: dict.get("operator-id").and_then(|v| String::try_from(v.clone()).ok()),
        allowed_mode: dict.get("allowed-mode").and_then(|v| u8::try_from(v.clone()).ok()),
    }
}

/// `org.freedesktop.ModemManager1.Modem` — lifecycle, unlock, identity.
pub struct ModemInterface {
    orchestrator: Arc<ModemOrchestrator>,
}

#[interface(name = "org.freedesktop.ModemManager1.Modem")]
impl ModemInterface {
    async fn enable(&self, enable: bool) -> zbus::fdo::Result<()> {
        if enable {
            self.orchestrator.enable(|| {}).await.map_err(to_fdo_error)
        } else {
            self.orchestrator.disable(|| {}).await.map_err(to_fdo_error)
        }
    }

    async fn send_pin(&self, pin: String) -> zbus::fdo::Result<()> {
        self.orchestrator.send_pin(&pin, None).await.map_err(to_fdo_error)
    }

    async fn send_puk(&self, puk: String, new_pin: String) -> zbus::fdo::Result<()> {
        self.orchestrator
            .send_pin(&puk, Some(&new_pin))
            .await
            .map_err(to_fdo_error)
    }

    async fn list_bearers(&self) -> Vec<(u8, String, bool)> {
        self.orchestrator
            .with_modem(|modem| {
                modem
                    .bearers
                    .iter()
                    .map(|b| (b.cid, b.apn.clone(), b.status == crate::bearer::ConnectionStatus::Connected))
                    .collect()
            })
            .await
    }

    #[zbus(property)]
    async fn state(&self) -> i32 {
        self.orchestrator.state().await as i32
    }

    #[zbus(property)]
    async fn manufacturer(&self) -> String {
        self.orchestrator.with_modem(|m| m.manufacturer.clone()).await.unwrap_or_default()
    }

    #[zbus(property)]
    async fn model(&self) -> String {
        self.orchestrator.with_modem(|m| m.model.clone()).await.unwrap_or_default()
    }

    #[zbus(property)]
    async fn revision(&self) -> String {
        self.orchestrator.with_modem(|m| m.revision.clone()).await.unwrap_or_default()
    }

    #[zbus(property)]
    async fn equipment_identifier(&self) -> String {
        self.orchestrator
            .with_modem(|m| m.equipment_identifier.clone())
            .await
            .unwrap_or_default()
    }

    #[zbus(property)]
    async fn device_identifier(&self) -> String {
        self.orchestrator.with_modem(|m| m.device_identifier.clone()).await.unwrap_or_default()
    }

    #[zbus(property)]
    async fn device(&self) -> String {
        self.orchestrator.with_modem(|m| m.device_path.clone()).await
    }

    #[zbus(property)]
    async fn drivers(&self) -> Vec<String> {
        self.orchestrator.with_modem(|m| m.drivers.clone()).await
    }

    #[zbus(property)]
    async fn own_numbers(&self) -> Vec<String> {
        self.orchestrator.with_modem(|m| m.own_numbers.clone()).await
    }

    /// `0` when unlocked; otherwise the raw `+CPIN?` code plus one, mirroring
    /// the consumer-side `UnlockRequired` property's "why am I locked" role.
    #[zbus(property)]
    async fn unlock_required(&self) -> u32 {
        match self.orchestrator.refresh_pin_status().await {
            Ok(crate::at::device_lock::PinStatus::Ready) => 0,
            Ok(status) => status as u32 + 1,
            Err(_) => 0,
        }
    }
}

/// `org.freedesktop.ModemManager1.Modem.Simple3gpp` — the orchestrated
/// Connect pipeline (spec §4.4.6) plus registration/scan.
pub struct Simple3gppInterface {
    orchestrator: Arc<ModemOrchestrator>,
}

#[interface(name = "org.freedesktop.ModemManager1.Modem.Simple3gpp")]
impl Simple3gppInterface {
    /// spec §4.4.6 `Connect(properties) → BearerPath`; there's no object
    /// manager here to mint real D-Bus object paths for bearers, so the
    /// "path" is a stable synthetic one keyed on the CID.
    async fn connect(&self, properties: HashMap<String, OwnedValue>) -> zbus::fdo::Result<String> {
        let props = connect_properties_from_dict(&properties);
        let cid = self.orchestrator.connect(props).await.map_err(to_fdo_error)?;
        Ok(format!("/org/freedesktop/ModemManager1/Bearer/{cid}"))
    }

    async fn disconnect(&self, bearer: String) -> zbus::fdo::Result<()> {
        let cid = bearer
            .rsplit('/')
            .next()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("not a bearer path: {bearer}")))?;
        self.orchestrator.disconnect(cid).await.map_err(to_fdo_error)
    }

    /// spec §6 remote surface's status snapshot — `state` plus the
    /// registration the Orchestrator has folded from `+CxREG` URCs.
    async fn get_status(&self) -> HashMap<String, OwnedValue> {
        let state = self.orchestrator.state().await;
        let registration = self.orchestrator.with_modem(|m| m.registration.aggregate()).await;
        let mut out = HashMap::new();
        out.insert("state".to_string(), OwnedValue::try_from(state as i32).unwrap());
        out.insert(
            "registration-state".to_string(),
            OwnedValue::try_from(format!("{registration:?}")).unwrap(),
        );
        out
    }

    async fn register(&self, operator_id: String) -> zbus::fdo::Result<()> {
        let operator_id = if operator_id.is_empty() { None } else { Some(operator_id) };
        self.orchestrator.register(operator_id).await.map_err(to_fdo_error)
    }

    async fn scan(&self) -> zbus::fdo::Result<Vec<(u32, String, String, String, i32)>> {
        let operators: Vec<ScannedOperator> = self.orchestrator.scan_networks().await.map_err(to_fdo_error)?;
        Ok(operators
            .into_iter()
            .map(|op| {
                (
                    op.status as u32,
                    op.long_name,
                    op.short_name,
                    op.operator_id,
                    op.access_tech.map(i32::from).unwrap_or(-1),
                )
            })
            .collect())
    }
}

/// `org.freedesktop.ModemManager1.Modem.Messaging` — reduced to what the
/// generic core actually tracks (spec §4.4.4): it folds received SMS into
/// reassembly state rather than minting one object per message, so there
/// are no per-message paths to list here, only the pending-reassembly
/// count.
pub struct MessagingInterface {
    orchestrator: Arc<ModemOrchestrator>,
}

#[interface(name = "org.freedesktop.ModemManager1.Modem.Messaging")]
impl MessagingInterface {
    #[zbus(property)]
    async fn pending_multipart_count(&self) -> u32 {
        match self.orchestrator.messaging() {
            Some(messaging) => messaging.pending_multipart_count() as u32,
            None => 0,
        }
    }

    async fn send(&self, number: String, text: String) -> zbus::fdo::Result<()> {
        let messaging = self
            .orchestrator
            .messaging()
            .ok_or_else(|| zbus::fdo::Error::NotSupported("messaging not supported".into()))?;
        messaging.send(&number, &text).await.map_err(to_fdo_error)
    }
}

/// `org.freedesktop.ModemManager1.Modem.Location` — the `3GPP-LAC-CI`
/// source the generic core offers (spec §4.4.5); GPS sources are
/// subclass-provided and have no implementation here.
pub struct LocationInterface {
    orchestrator: Arc<ModemOrchestrator>,
}

#[interface(name = "org.freedesktop.ModemManager1.Modem.Location")]
impl LocationInterface {
    #[zbus(property)]
    async fn capabilities(&self) -> u32 {
        match self.orchestrator.location() {
            Some(location) => location.supported_sources().raw() as u32,
            None => 0,
        }
    }

    /// `{"lac": ..., "ci": ...}` for the one source the generic core ever
    /// offers; empty when unavailable.
    async fn get_location(&self) -> HashMap<String, OwnedValue> {
        let Some(location) = self.orchestrator.location() else {
            return HashMap::new();
        };
        let cell = location.enable().await;
        let mut out = HashMap::new();
        if let Some(lac) = cell.lac {
            out.insert("lac".to_string(), OwnedValue::try_from(lac).unwrap());
        }
        if let Some(ci) = cell.ci {
            out.insert("ci".to_string(), OwnedValue::try_from(ci).unwrap());
        }
        out
    }
}

/// Attaches all four interfaces for one modem at `path` on `connection`.
/// Bus-name ownership (`RequestName`) is left to the caller, per spec.md's
/// scoping of this module to the object model alone.
pub async fn register_modem(connection: &zbus::Connection, path: &str, orchestrator: Arc<ModemOrchestrator>) -> zbus::Result<()> {
    let path = zbus::zvariant::ObjectPath::try_from(path.to_string())?;
    let object_server = connection.object_server();
    object_server
        .at(
            path.clone(),
            ModemInterface {
                orchestrator: orchestrator.clone(),
            },
        )
        .await?;
    object_server
        .at(
            path.clone(),
            Simple3gppInterface {
                orchestrator: orchestrator.clone(),
            },
        )
        .await?;
    object_server
        .at(
            path.clone(),
            MessagingInterface {
                orchestrator: orchestrator.clone(),
            },
        )
        .await?;
    object_server
        .at(
            path,
            LocationInterface {
                orchestrator: orchestrator.clone(),
            },
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_properties_read_known_keys_and_ignore_unknown_ones() {
        let mut dict: HashMap<String, OwnedValue> = HashMap::new();
        dict.insert("apn".to_string(), OwnedValue::try_from("internet").unwrap());
        dict.insert("pin".to_string(), OwnedValue::try_from("1234").unwrap());
        dict.insert("unused".to_string(), OwnedValue::try_from(42u32).unwrap());
        let props = connect_properties_from_dict(&dict);
        assert_eq!(props.apn, "internet");
        assert_eq!(props.pin.as_deref(), Some("1234"));
        assert!(props.operator_id.is_none());
    }

    #[test]
    fn connect_properties_default_apn_is_empty_when_absent() {
        let props = connect_properties_from_dict(&HashMap::new());
        assert_eq!(props.apn, "");
    }
}
