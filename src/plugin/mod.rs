//! Plugin Router (spec §4.6): scores candidate plugins against a port
//! descriptor, breaks ties by declaration order (with a `sort_last`
//! fallback flag), and runs the fixed probing protocol.

pub mod generic;
pub mod huawei;

use std::time::Duration;

use crate::at::device_lock::{PinStatus, QueryPinStatus};
use crate::at::mobile_control::{QueryCapabilities, QueryIdentification, QueryModel};
use crate::at::AtCommand;
use crate::error::Result;
use crate::port::Subsystem;
use crate::qcdm::{QcdmCommand, VersionInfo, VersionInfoResponse};
use crate::queue::CommandQueue;

/// `(uid, drivers, vendor, product, subsystem, udev-props)` as presented by
/// the port-discovery interface, reduced to what scoring needs (spec
/// §4.6).
#[derive(Debug, Clone, Default)]
pub struct PortDescriptor {
    pub subsystem: Subsystem,
    pub driver: String,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub vendor_string: Option<String>,
    pub product_string: Option<String>,
    pub udev_tags: Vec<String>,
    /// Whether this is USB interface 0 — the one the probing protocol
    /// always probes first (spec §4.6).
    pub is_first_interface: bool,
}

/// A plugin's allow-lists (spec §4.6 "each plugin declares allow-lists").
/// An empty list on any field is a wildcard for that dimension; a plugin
/// is a candidate only if every *non-empty* list matches the descriptor.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    pub subsystems: Vec<Subsystem>,
    pub drivers: Vec<String>,
    pub vendor_ids: Vec<String>,
    pub product_ids: Vec<String>,
    pub vendor_strings: Vec<String>,
    pub product_strings: Vec<String>,
    pub udev_tags: Vec<String>,
}

impl AllowList {
    fn matches(&self, d: &PortDescriptor) -> bool {
        fn ok<T: PartialEq>(list: &[T], value: Option<&T>) -> bool {
            list.is_empty() || value.is_some_and(|v| list.contains(v))
        }

        (self.subsystems.is_empty() || self.subsystems.contains(&d.subsystem))
            && ok(&self.drivers, Some(&d.driver))
            && ok(&self.vendor_ids, d.vendor_id.as_ref())
            && ok(&self.product_ids, d.product_id.as_ref())
            && ok(&self.vendor_strings, d.vendor_string.as_ref())
            && ok(&self.product_strings, d.product_string.as_ref())
            && (self.udev_tags.is_empty() || self.udev_tags.iter().any(|t| d.udev_tags.contains(t)))
    }
}

/// The fixed probe results a plugin's [`Plugin::level`] scores against
/// (spec §4.6 "probes for capabilities via a fixed AT sequence ... and
/// optionally QCDM").
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    pub gcap: Option<Vec<String>>,
    pub ati: Option<String>,
    pub pin_status: Option<PinStatus>,
    pub model: Option<String>,
    pub qcdm_version: Option<VersionInfoResponse>,
}

impl ProbeResult {
    pub fn is_lte_capable(&self) -> bool {
        self.gcap
            .as_ref()
            .is_some_and(|caps| caps.iter().any(|c| c.eq_ignore_ascii_case("+CGEREG") || c.contains("LTE")))
    }

    pub fn is_cdma(&self) -> bool {
        self.qcdm_version.is_some()
    }
}

/// A bare AT command carrying owned, runtime-built text — used for a
/// plugin's custom init commands (spec §4.6 "custom init commands"), which
/// aren't known until a descriptor is matched so can't be a `'static str`
/// like [`crate::at::mobile_control::PlainCommand`].
pub struct RawCommand(pub String);

impl AtCommand for RawCommand {
    type Response = ();

    fn command_text(&self) -> String {
        self.0.clone()
    }

    fn parse(&self, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Runs a plugin's custom init commands, then the fixed AT probe sequence,
/// then (if a QCDM port is open) `version_info` (spec §4.6 "Probing
/// protocol"). Errors on any individual probe are swallowed — a modem that
/// doesn't support `+CPIN?` yet, say, still yields a usable partial
/// [`ProbeResult`] for scoring.
pub async fn probe(
    primary: &CommandQueue,
    qcdm: Option<&CommandQueue>,
    custom_init_commands: &[String],
) -> ProbeResult {
    for text in custom_init_commands {
        let _ = primary.enqueue(&RawCommand(text.clone())).await;
    }

    let gcap = primary.enqueue(&QueryCapabilities).await.ok();
    let ati = primary.enqueue(&QueryIdentification { variant: 0 }).await.ok();
    let pin_status = primary.enqueue(&QueryPinStatus).await.ok();
    let model = primary.enqueue_cached(&QueryModel).await.ok();

    let qcdm_version = match qcdm {
        Some(q) => q.enqueue_qcdm(&VersionInfo).await.ok(),
        None => None,
    };

    ProbeResult {
        gcap,
        ati,
        pin_status,
        model,
        qcdm_version,
    }
}

/// One Plugin Router entry (spec §4.6).
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn allow_list(&self) -> &AllowList;

    /// The level (0-20) this plugin claims for a descriptor that already
    /// passed its allow-list gate, given the probe results (spec §4.6 "level
    /// is domain-specific"). `0` means "not actually a match despite
    /// passing the allow-list" (e.g. a vendor-quirk plugin that only wants
    /// one of several products sharing a vendor id).
    fn level(&self, descriptor: &PortDescriptor, probe: &ProbeResult) -> u8;

    /// Device-specific wake-up commands sent before the fixed probe
    /// sequence (spec §4.6 "custom init commands", e.g. Huawei
    /// `^CURC=0; ^GETPORTMODE`).
    fn custom_init_commands(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fallback plugins (e.g. a generic catch-all, or Iridium per spec
    /// §4.5's example) sort after every plugin of equal level (spec §4.6
    /// "ties broken by declaration order with an explicit `sort_last`
    /// flag").
    fn sort_last(&self) -> bool {
        false
    }
}

/// Discovery-loop cycles a non-interface-0 port's probing may be deferred
/// for before `max_defers` forces a decision anyway (spec §4.6).
pub struct DeferralTracker {
    remaining: u32,
}

impl DeferralTracker {
    pub fn new(max_defers: u32) -> Self {
        Self { remaining: max_defers }
    }

    /// Returns `true` if probing should be deferred this cycle (interface-0
    /// classification not yet available and defers remain).
    pub fn should_defer(&mut self, interface0_classified: bool) -> bool {
        if interface0_classified || self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Holds every registered [`Plugin`] in declaration order and selects the
/// winner for a descriptor (spec §4.6 scoring/tie-break).
pub struct PluginRouter {
    plugins: Vec<Box<dyn Plugin>>,
}

impl Default for PluginRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRouter {
    pub fn new() -> Self {
        Self { plugins: Vec::new() }
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Picks the highest-level candidate, ties broken by declaration order
    /// with `sort_last` plugins pushed behind every non-`sort_last` tie
    /// (spec §4.6).
    pub fn select(&self, descriptor: &PortDescriptor, probe: &ProbeResult) -> Option<&dyn Plugin> {
        let mut best: Option<(usize, u8, &dyn Plugin)> = None;
        for (idx, plugin) in self.plugins.iter().enumerate() {
            if !plugin.allow_list().matches(descriptor) {
                continue;
            }
            let level = plugin.level(descriptor, probe);
            if level == 0 {
                continue;
            }
            let candidate_key = (level, !plugin.sort_last(), idx);
            let better = match &best {
                None => true,
                Some((best_idx, best_level, best_plugin)) => {
                    let best_key = (*best_level, !best_plugin.sort_last(), *best_idx);
                    candidate_key > best_key
                }
            };
            if better {
                best = Some((idx, level, plugin.as_ref()));
            }
        }
        best.map(|(_, _, plugin)| plugin)
    }
}

pub const DISCOVERY_CYCLE: Duration = Duration::from_secs(1);

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        name: &'static str,
        allow: AllowList,
        level: u8,
        sort_last: bool,
    }

    impl Plugin for Stub {
        fn name(&self) -> &'static str {
            self.name
        }
        fn allow_list(&self) -> &AllowList {
            &self.allow
        }
        fn level(&self, _descriptor: &PortDescriptor, _probe: &ProbeResult) -> u8 {
            self.level
        }
        fn sort_last(&self) -> bool {
            self.sort_last
        }
    }

    fn descriptor() -> PortDescriptor {
        PortDescriptor {
            subsystem: Subsystem::Tty,
            driver: "option".into(),
            vendor_id: Some("12d1".into()),
            product_id: Some("1506".into()),
            ..Default::default()
        }
    }

    #[test]
    fn highest_level_wins() {
        let mut router = PluginRouter::new();
        router.register(Box::new(Stub {
            name: "low",
            allow: AllowList::default(),
            level: 10,
            sort_last: false,
        }));
        router.register(Box::new(Stub {
            name: "high",
            allow: AllowList::default(),
            level: 20,
            sort_last: false,
        }));
        let winner = router.select(&descriptor(), &ProbeResult::default()).unwrap();
        assert_eq!(winner.name(), "high");
    }

    #[test]
    fn sort_last_loses_ties() {
        let mut router = PluginRouter::new();
        router.register(Box::new(Stub {
            name: "fallback",
            allow: AllowList::default(),
            level: 5,
            sort_last: true,
        }));
        router.register(Box::new(Stub {
            name: "specific",
            allow: AllowList::default(),
            level: 5,
            sort_last: false,
        }));
        let winner = router.select(&descriptor(), &ProbeResult::default()).unwrap();
        assert_eq!(winner.name(), "specific");
    }

    #[test]
    fn allow_list_gate_excludes_non_matching_vendor() {
        let allow = AllowList {
            vendor_ids: vec!["0000".into()],
            ..Default::default()
        };
        assert!(!allow.matches(&descriptor()));
    }

    #[test]
    fn deferral_tracker_stops_after_max_defers() {
        let mut tracker = DeferralTracker::new(2);
        assert!(tracker.should_defer(false));
        assert!(tracker.should_defer(false));
        assert!(!tracker.should_defer(false));
    }

    #[test]
    fn deferral_tracker_never_defers_once_interface0_is_classified() {
        let mut tracker = DeferralTracker::new(5);
        assert!(!tracker.should_defer(true));
    }
}
