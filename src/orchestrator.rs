//! The Modem Orchestrator (spec §4.5): owns one modem's ports, Command
//! Queues and Capability Interfaces, and drives the Initialize/Enable/
//! Disable pipelines in the fixed order spec.md names.
//!
//! Capability instances are `Arc`-wrapped so the URC handlers registered
//! below — necessarily synchronous closures, per [`crate::urc::UrcDispatcher`]'s
//! `Handler` type — can clone a handle into a spawned task that calls the
//! capability's (async) reaction method, the pattern that module's own doc
//! comment sanctions.

use std::sync::{Arc, Mutex as SyncMutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::at::device_lock::{PinStatus, QueryPinStatus};
use crate::at::messaging::{parse_cds_frames, parse_cmti_body};
use crate::at::network_service::{parse_registration_body, RegDomain};
use crate::at::time::parse_ctzv_body;
use crate::at::ussd::parse_cusd_body;
use crate::capability::cdma::CdmaCapability;
use crate::capability::firmware::FirmwareCapability;
use crate::capability::location::LocationCapability;
use crate::capability::messaging::MessagingCapability;
use crate::capability::modem::ModemCapability;
use crate::capability::simple::SimpleCapability;
use crate::capability::three_gpp::ThreeGppCapability;
use crate::capability::time::TimeCapability;
use crate::capability::ussd::UssdCapability;
use crate::capability::CapabilityContext;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::modem::{Modem, State};
use crate::port::{OpenParams, PortId, PortsContext, Transport};
use crate::queue::CommandQueue;
use crate::registration::RegistrationState;
use crate::urc::UrcDispatcher;

/// A port this modem owns, as handed down by `setup_ports`/the Plugin
/// Router (spec §4.5 step 1). The Orchestrator itself only needs enough to
/// open a [`Transport`]; full classification (driver, flags, subsystem)
/// lives on [`crate::port::Port`] and is folded into [`Modem::ports`].
#[derive(Debug, Clone)]
pub struct OrchestratorPort {
    pub id: PortId,
    pub device_path: String,
    pub open_params: OpenParams,
}

/// The port set a modem is constructed with — already classified
/// Primary/Secondary/QCDM (spec §4.5 step 1's output). GPS/Data ports are
/// recorded on [`Modem::ports`] by the caller but carry no Command Queue of
/// their own.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorPorts {
    pub primary: Option<OrchestratorPort>,
    pub secondary: Option<OrchestratorPort>,
    pub qcdm: Option<OrchestratorPort>,
}

/// Bundles one port's live [`CommandQueue`], the background task driving
/// it, and the [`UrcDispatcher`] it routes unmatched frames to.
struct OpenPort {
    queue: Arc<CommandQueue>,
    urc: UrcDispatcher,
    join: JoinHandle<()>,
}

impl Drop for OpenPort {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Owns one modem end-to-end: its data model, its open ports, and every
/// Capability Interface bound to them (spec §4.5).
pub struct ModemOrchestrator {
    modem: AsyncMutex<Modem>,
    config: Config,
    ports: OrchestratorPorts,

    primary_port: SyncMutex<Option<OpenPort>>,
    qcdm_port: SyncMutex<Option<OpenPort>>,
    init_ports_ctx: SyncMutex<Option<PortsContext>>,
    enable_ports_ctx: SyncMutex<Option<PortsContext>>,

    modem_cap: SyncMutex<Option<Arc<ModemCapability>>>,
    three_gpp: SyncMutex<Option<Arc<ThreeGppCapability>>>,
    ussd: SyncMutex<Option<Arc<UssdCapability>>>,
    cdma: SyncMutex<Option<Arc<CdmaCapability>>>,
    location: SyncMutex<Option<Arc<LocationCapability>>>,
    messaging: SyncMutex<Option<Arc<MessagingCapability>>>,
    time: SyncMutex<Option<Arc<TimeCapability>>>,
    firmware: SyncMutex<Option<Arc<FirmwareCapability>>>,
    simple: SyncMutex<Option<Arc<SimpleCapability>>>,

    /// `+CDS` arrives as two frames: a `+CDS: <len>` header, then a bare
    /// hex PDU line with no recognizable prefix of its own (spec §4.4.4).
    /// The header handler stashes it here; the PDU-line handler (registered
    /// last, lowest priority) only fires when this is set.
    pending_cds_header: SyncMutex<Option<String>>,

    /// Background task re-issuing the full registration check every
    /// `registration_poll_interval_secs` while Enabled-but-not-Registered
    /// (spec §4.4.2); spawned in `enable`, aborted in `disable`.
    registration_poll: SyncMutex<Option<JoinHandle<()>>>,
}

impl ModemOrchestrator {
    pub fn new(device_path: String, ports: OrchestratorPorts, config: Config) -> Self {
        Self {
            modem: AsyncMutex::new(Modem::new(device_path)),
            config,
            ports,
            primary_port: SyncMutex::new(None),
            qcdm_port: SyncMutex::new(None),
            init_ports_ctx: SyncMutex::new(None),
            enable_ports_ctx: SyncMutex::new(None),
            modem_cap: SyncMutex::new(None),
            three_gpp: SyncMutex::new(None),
            ussd: SyncMutex::new(None),
            cdma: SyncMutex::new(None),
            location: SyncMutex::new(None),
            messaging: SyncMutex::new(None),
            time: SyncMutex::new(None),
            firmware: SyncMutex::new(None),
            simple: SyncMutex::new(None),
            pending_cds_header: SyncMutex::new(None),
            registration_poll: SyncMutex::new(None),
        }
    }

    pub async fn state(&self) -> State {
        self.modem.lock().await.state
    }

    /// Read-only access for remote-object adapters; holds the lock for the
    /// duration of `f`.
    pub async fn with_modem<R>(&self, f: impl FnOnce(&Modem) -> R) -> R {
        f(&*self.modem.lock().await)
    }

    fn opened_primary(&self) -> Result<Arc<CommandQueue>> {
        self.primary_port
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.queue.clone())
            .ok_or(Error::PortClosed)
    }

    fn opened_qcdm(&self) -> Option<Arc<CommandQueue>> {
        self.qcdm_port.lock().unwrap().as_ref().map(|p| p.queue.clone())
    }

    /// Opens `spec`'s Transport and spawns its Command Queue, returning the
    /// bundle plus a fresh [`UrcDispatcher`] for the caller to register
    /// patterns on before any command is enqueued (spec §5 ordering:
    /// "URC handler invocation happens before the next command is written").
    async fn open_port(&self, spec: &OrchestratorPort) -> Result<OpenPort> {
        let transport = Transport::open(&spec.device_path, spec.open_params).await?;
        let urc = UrcDispatcher::new();
        let (queue, join) = CommandQueue::spawn(transport, urc.clone(), self.config.max_timeouts, spec.open_params.dialect);
        Ok(OpenPort {
            queue: Arc::new(queue),
            urc,
            join,
        })
    }

    /// Registers the generic core's fixed URC patterns on the primary
    /// port (spec §4.4.2 registration reporting, §4.4.4 `+CMTI`/`+CDS`,
    /// §4.4 Time's `+CTZV`, §4.4.2 USSD's `+CUSD`). Capability handles must
    /// already be constructed.
    fn wire_urcs(self: &Arc<Self>, urc: &UrcDispatcher) -> Result<()> {
        for (pattern, domain) in [
            (r"^\+CREG:", RegDomain::Cs),
            (r"^\+CGREG:", RegDomain::Ps),
            (r"^\+CEREG:", RegDomain::Eps),
        ] {
            let this = self.clone();
            urc.register(
                pattern,
                Box::new(move |frame: &str| {
                    let prefix = match domain {
                        RegDomain::Cs => "+CREG:",
                        RegDomain::Ps => "+CGREG:",
                        RegDomain::Eps => "+CEREG:",
                    };
                    let Some(body) = frame.strip_prefix(prefix).map(|s| s.trim()) else {
                        return;
                    };
                    if let Ok(report) = parse_registration_body(domain, body) {
                        let this = this.clone();
                        tokio::spawn(async move {
                            // Fold the reporting domain's own state in
                            // immediately, then re-check all three domains
                            // (spec §4.4.2: a CxREG URC triggers a full
                            // re-check, not just an update of its own
                            // domain) if the 3GPP capability is up yet.
                            this.modem
                                .lock()
                                .await
                                .registration
                                .set(domain, RegistrationState::from_raw_stat(report.stat));
                            if let Some(three_gpp) = this.three_gpp.lock().unwrap().clone() {
                                let agg = three_gpp.check_registration().await;
                                this.modem.lock().await.registration = agg;
                            }
                        });
                    }
                }),
            )?;
        }

        {
            let this = self.clone();
            urc.register(
                r"^\+CUSD:",
                Box::new(move |frame: &str| {
                    let Some(body) = frame.strip_prefix("+CUSD:").map(|s| s.trim()) else {
                        return;
                    };
                    if let Ok(notif) = parse_cusd_body(body) {
                        if let Some(ussd) = this.ussd.lock().unwrap().clone() {
                            let _ = ussd.on_unsolicited(&notif);
                        }
                    }
                }),
            )?;
        }

        {
            let this = self.clone();
            urc.register(
                r"^\+CMTI:",
                Box::new(move |frame: &str| {
                    let Some(body) = frame.strip_prefix("+CMTI:").map(|s| s.trim()) else {
                        return;
                    };
                    if let Ok(indicator) = parse_cmti_body(body) {
                        if let Some(messaging) = this.messaging.lock().unwrap().clone() {
                            tokio::spawn(async move {
                                let _ = messaging.on_new_message_indicator(&indicator).await;
                            });
                        }
                    }
                }),
            )?;
        }

        {
            let this = self.clone();
            urc.register(
                r"^\+CDS:",
                Box::new(move |frame: &str| {
                    *this.pending_cds_header.lock().unwrap() = Some(frame.trim().to_string());
                }),
            )?;
        }
        {
            // Lowest priority: a bare hex line only means something while a
            // `+CDS:` header is pending (spec §4.4.4 "parse the inline PDU").
            let this = self.clone();
            urc.register(
                r"^[0-9A-Fa-f]+$",
                Box::new(move |frame: &str| {
                    let Some(header) = this.pending_cds_header.lock().unwrap().take() else {
                        return;
                    };
                    if let Ok(report) = parse_cds_frames(&header, frame.trim()) {
                        if let Some(messaging) = this.messaging.lock().unwrap().clone() {
                            let _ = messaging.on_delivery_status_report(&report.pdu_hex);
                        }
                    }
                }),
            )?;
        }

        {
            let this = self.clone();
            urc.register(
                r"^\+CTZV:",
                Box::new(move |frame: &str| {
                    let Some(body) = frame.strip_prefix("+CTZV:").map(|s| s.trim()) else {
                        return;
                    };
                    if parse_ctzv_body(body).is_some() {
                        if let Some(time) = this.time.lock().unwrap().clone() {
                            time.on_ctzv(body);
                        }
                    }
                }),
            )?;
        }

        Ok(())
    }

    /// spec §4.5 Initialization pipeline, steps 1-6. `started` (step 2) is
    /// left to the caller's Plugin Router hook — passed in as `started_hook`
    /// since the generic core ships no device-specific wake-up of its own.
    pub async fn initialize(self: &Arc<Self>, started_hook: impl FnOnce() + Send) -> Result<()> {
        let primary_spec = self
            .ports
            .primary
            .clone()
            .ok_or_else(|| Error::Other("no Primary port classified".into()))?;

        {
            let mut modem = self.modem.lock().await;
            modem.state = State::Initializing;
        }

        let opened = self.open_port(&primary_spec).await?;
        self.wire_urcs(&opened.urc)?;
        *self.primary_port.lock().unwrap() = Some(opened);

        if let Some(qcdm_spec) = &self.ports.qcdm {
            let opened = self.open_port(qcdm_spec).await?;
            *self.qcdm_port.lock().unwrap() = Some(opened);
        }

        *self.init_ports_ctx.lock().unwrap() = Some(PortsContext::new(
            Some(primary_spec.id.clone()),
            self.ports.secondary.as_ref().map(|p| p.id.clone()),
            self.ports.qcdm.as_ref().map(|p| p.id.clone()),
        ));

        started_hook();

        let ctx = CapabilityContext::new(self.opened_primary()?, self.opened_qcdm());
        let modem_cap = Arc::new(ModemCapability::new(ctx.clone()));

        {
            let mut modem = self.modem.lock().await;
            modem_cap.initialize(&mut modem).await?;
        }
        *self.modem_cap.lock().unwrap() = Some(modem_cap);

        let locked = {
            let modem = self.modem.lock().await;
            modem
                .sim
                .as_ref()
                .map(|sim| sim.is_locked())
                .unwrap_or(false)
        };

        let firmware_cap = Arc::new(FirmwareCapability::new(ctx.clone()));
        if locked {
            let revision = firmware_cap.initialize().await;
            let mut modem = self.modem.lock().await;
            if revision.is_some() {
                modem.revision = revision;
            }
            modem.state = State::Locked;
            *self.firmware.lock().unwrap() = Some(firmware_cap);
            return Ok(());
        }

        let is_cdma_only = {
            let modem = self.modem.lock().await;
            modem.capabilities.is_cdma_only()
        };

        let three_gpp_cap = Arc::new(ThreeGppCapability::new(ctx.clone()));
        let ussd_cap = Arc::new(UssdCapability::new(ctx.clone()));
        let cdma_cap = Arc::new(CdmaCapability::new(ctx.clone()));
        let location_cap = Arc::new(LocationCapability::new(ctx.clone(), !is_cdma_only));
        let messaging_cap = Arc::new(MessagingCapability::new(ctx.clone()));
        let time_cap = Arc::new(TimeCapability::new(ctx.clone()));
        let simple_cap = Arc::new(SimpleCapability::new(ctx.clone()));

        *self.three_gpp.lock().unwrap() = Some(three_gpp_cap);
        *self.ussd.lock().unwrap() = Some(ussd_cap);
        *self.cdma.lock().unwrap() = Some(cdma_cap);
        *self.location.lock().unwrap() = Some(location_cap);
        *self.messaging.lock().unwrap() = Some(messaging_cap);
        *self.time.lock().unwrap() = Some(time_cap);
        *self.firmware.lock().unwrap() = Some(firmware_cap);
        *self.simple.lock().unwrap() = Some(simple_cap);

        {
            let mut modem = self.modem.lock().await;
            modem.state = State::Disabled;
        }
        Ok(())
    }

    /// spec §4.5 Enable pipeline. `enabling_started_hook` is the plugin
    /// hook that opens secondary/QCDM ports and flashes DTR — the generic
    /// core already opened its ports at Initialize time, so the hook here
    /// is purely a caller extension point.
    pub async fn enable(self: &Arc<Self>, enabling_started_hook: impl FnOnce() + Send) -> Result<()> {
        {
            let mut modem = self.modem.lock().await;
            if modem.state != State::Disabled {
                return Err(Error::WrongState);
            }
            modem.state = State::Enabling;
        }

        enabling_started_hook();

        *self.enable_ports_ctx.lock().unwrap() = self.init_ports_ctx.lock().unwrap().clone();

        let modem_cap = self.modem_cap.lock().unwrap().clone().ok_or(Error::WrongState)?;
        {
            let mut modem = self.modem.lock().await;
            modem_cap.enable(&mut modem).await?;
        }

        let is_cdma_only = self.modem.lock().await.capabilities.is_cdma_only();

        if let Some(three_gpp) = self.three_gpp.lock().unwrap().clone() {
            three_gpp.enable().await?;
        }
        // 3GPP-USSD has no interface-level enable step of its own (spec
        // §4.4.2): it is ready to serve `Send`/`Cancel` as soon as the
        // primary port's Command Queue is up.
        if let Some(cdma) = self.cdma.lock().unwrap().clone() {
            if is_cdma_only {
                cdma.enable().await?;
            }
        }

        // Location/Messaging/Time errors are non-fatal (spec §4.5).
        if let Some(location) = self.location.lock().unwrap().clone() {
            let cell = location.enable().await;
            tracing::debug!(?cell, "location enabled");
        }
        if let Some(messaging) = self.messaging.lock().unwrap().clone() {
            match messaging.enable(is_cdma_only).await {
                Ok(backlog) => tracing::debug!(count = backlog.len(), "messaging backlog replayed"),
                Err(e) => tracing::warn!(error = %e, "messaging enable failed, continuing"),
            }
        }
        if let Some(time) = self.time.lock().unwrap().clone() {
            time.enable().await;
        }

        {
            let mut modem = self.modem.lock().await;
            modem.state = State::Enabled;
        }

        if self.three_gpp.lock().unwrap().is_some() {
            self.spawn_registration_poll();
        }

        Ok(())
    }

    /// Periodic `+CxREG?` re-check (spec §4.4.2: "every 30s while Enabled-
    /// but-not-Registered", using `registration_poll_interval_secs`), in
    /// addition to the re-check each CxREG URC already triggers in
    /// `wire_urcs`. Stops itself once the aggregate state is Registered;
    /// `disable` aborts it outright.
    fn spawn_registration_poll(self: &Arc<Self>) {
        let this = self.clone();
        let interval = std::time::Duration::from_secs(self.config.registration_poll_interval_secs.max(1));
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let three_gpp = match this.three_gpp.lock().unwrap().clone() {
                    Some(cap) => cap,
                    None => return,
                };
                let still_enabled = matches!(this.modem.lock().await.state, State::Enabled);
                if !still_enabled {
                    return;
                }
                let already_registered = this.modem.lock().await.registration.aggregate().is_registered();
                if already_registered {
                    continue;
                }
                let agg = three_gpp.check_registration().await;
                this.modem.lock().await.registration = agg;
            }
        });
        *self.registration_poll.lock().unwrap() = Some(handle);
    }

    /// spec §4.5 Disable pipeline: reverse order, bearers first, ports
    /// last.
    pub async fn disable(self: &Arc<Self>, disabling_stopped_hook: impl FnOnce() + Send) -> Result<()> {
        {
            let mut modem = self.modem.lock().await;
            if !matches!(modem.state, State::Enabled | State::Registered | State::Searching) {
                return Err(Error::WrongState);
            }
            modem.state = State::Disabling;
        }

        if let Some(handle) = self.registration_poll.lock().unwrap().take() {
            handle.abort();
        }

        self.disconnect_all_bearers().await;

        // Time/Messaging/Location have no disable-step AT sequence of their
        // own in the generic core; they simply stop being polled/fed.
        if let Some(cdma) = self.cdma.lock().unwrap().clone() {
            let _ = cdma;
        }
        if let Some(three_gpp) = self.three_gpp.lock().unwrap().clone() {
            let _ = three_gpp;
        }
        if let Some(modem_cap) = self.modem_cap.lock().unwrap().clone() {
            modem_cap.disable().await?;
        }

        let enable_ctx = self.enable_ports_ctx.lock().unwrap().take();
        disabling_stopped_hook();
        drop(enable_ctx);

        {
            let mut modem = self.modem.lock().await;
            modem.state = State::Disabled;
        }
        Ok(())
    }

    async fn disconnect_all_bearers(&self) {
        let mut modem = self.modem.lock().await;
        for bearer in modem.bearers.iter_mut() {
            bearer.status = crate::bearer::ConnectionStatus::Disconnected;
        }
    }

    /// Re-reads `+CPIN?` and folds it into `Modem.sim`, used by the
    /// generic core's own unlock-check flow (spec §4.4.6) and by a caller
    /// wanting a fresh lock-state snapshot outside of Connect.
    pub async fn refresh_pin_status(&self) -> Result<PinStatus> {
        let queue = self.opened_primary()?;
        let status = queue.enqueue(&QueryPinStatus).await?;
        let mut modem = self.modem.lock().await;
        if let Some(sim) = modem.sim.as_mut() {
            sim.pin_lock_state = status.into();
        }
        Ok(status)
    }

    pub fn simple(&self) -> Option<Arc<SimpleCapability>> {
        self.simple.lock().unwrap().clone()
    }

    pub fn three_gpp(&self) -> Option<Arc<ThreeGppCapability>> {
        self.three_gpp.lock().unwrap().clone()
    }

    pub fn cdma(&self) -> Option<Arc<CdmaCapability>> {
        self.cdma.lock().unwrap().clone()
    }

    pub fn ussd(&self) -> Option<Arc<UssdCapability>> {
        self.ussd.lock().unwrap().clone()
    }

    pub fn messaging(&self) -> Option<Arc<MessagingCapability>> {
        self.messaging.lock().unwrap().clone()
    }

    pub fn modem_cap(&self) -> Option<Arc<ModemCapability>> {
        self.modem_cap.lock().unwrap().clone()
    }

    pub fn location(&self) -> Option<Arc<LocationCapability>> {
        self.location.lock().unwrap().clone()
    }

    pub fn time(&self) -> Option<Arc<TimeCapability>> {
        self.time.lock().unwrap().clone()
    }

    /// Unlock path for a remote-object caller outside of Connect's own
    /// Unlock-Check (spec §4.4.6); `new_pin` supplies the PUK's
    /// accompanying replacement PIN.
    pub async fn send_pin(&self, pin: &str, new_pin: Option<&str>) -> Result<()> {
        self.opened_primary()?
            .enqueue(&crate::at::device_lock::SendPin {
                pin: pin.to_string(),
                new_pin: new_pin.map(str::to_string),
            })
            .await?;
        let mut modem = self.modem.lock().await;
        if let Some(sim) = modem.sim.as_mut() {
            sim.pin_lock_state = crate::sim::PinLockState::Unlocked;
        }
        Ok(())
    }

    /// spec §4.4.6 `Connect`, driven from the Orchestrator so a remote-object
    /// caller doesn't need to assemble the capability set itself.
    pub async fn connect(&self, props: crate::capability::simple::ConnectProperties) -> Result<u8> {
        let simple = self.simple.lock().unwrap().clone().ok_or(Error::WrongState)?;
        let modem_cap = self.modem_cap.lock().unwrap().clone().ok_or(Error::WrongState)?;
        let three_gpp = self.three_gpp.lock().unwrap().clone();
        let cdma = self.cdma.lock().unwrap().clone();
        let mut modem = self.modem.lock().await;
        simple
            .connect(&mut modem, &modem_cap, three_gpp.as_deref(), cdma.as_deref(), props)
            .await
    }

    pub async fn disconnect(&self, cid: u8) -> Result<()> {
        let mut modem = self.modem.lock().await;
        let bearer = modem.bearers.get_mut(cid).ok_or(Error::Other(format!("no bearer {cid}")))?;
        bearer.status = crate::bearer::ConnectionStatus::Disconnected;
        Ok(())
    }

    pub async fn scan_networks(&self) -> Result<Vec<crate::at::network_service::ScannedOperator>> {
        let three_gpp = self.three_gpp.lock().unwrap().clone().ok_or(Error::NotSupported)?;
        three_gpp.scan_networks().await
    }

    pub async fn register(&self, operator_id: Option<String>) -> Result<()> {
        let three_gpp = self.three_gpp.lock().unwrap().clone().ok_or(Error::NotSupported)?;
        three_gpp.register(operator_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_orchestrator_has_no_open_ports() {
        let o = ModemOrchestrator::new(
            "/sys/devices/foo".into(),
            OrchestratorPorts::default(),
            Config::default(),
        );
        assert!(o.primary_port.lock().unwrap().is_none());
        assert!(o.qcdm_port.lock().unwrap().is_none());
    }
}
