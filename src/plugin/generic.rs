//! The `generic` fallback plugin (spec §4.6 "the reference plugin set
//! ships a `generic` fallback (`sort_last`) plugin"): matches any port,
//! claims the lowest level that still wins when nothing more specific is
//! registered, and runs no vendor-specific init sequence.

use crate::plugin::{AllowList, Plugin, PortDescriptor, ProbeResult};

pub struct GenericPlugin {
    allow_list: AllowList,
}

impl GenericPlugin {
    pub fn new() -> Self {
        Self {
            allow_list: AllowList::default(),
        }
    }
}

impl Default for GenericPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for GenericPlugin {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// spec §4.6 "level is domain-specific (e.g., LTE-capable probe
    /// succeeds -> 20, CDMA detected -> 10)"; the generic plugin only
    /// offers the bare floor (1) so any vendor-specific plugin that scores
    /// higher always wins, but something still claims a device nothing
    /// else matches.
    fn level(&self, _descriptor: &PortDescriptor, probe: &ProbeResult) -> u8 {
        if probe.is_lte_capable() {
            20
        } else if probe.is_cdma() {
            10
        } else {
            1
        }
    }

    fn sort_last(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Subsystem;

    #[test]
    fn generic_matches_every_descriptor() {
        let plugin = GenericPlugin::new();
        let descriptor = PortDescriptor {
            subsystem: Subsystem::Tty,
            driver: "whatever".into(),
            ..Default::default()
        };
        assert!(plugin.allow_list().matches(&descriptor));
    }

    #[test]
    fn generic_scores_lte_above_plain_service() {
        let plugin = GenericPlugin::new();
        let descriptor = PortDescriptor::default();
        let lte_probe = ProbeResult {
            gcap: Some(vec!["+CGEREG".into()]),
            ..Default::default()
        };
        assert_eq!(plugin.level(&descriptor, &lte_probe), 20);
        assert_eq!(plugin.level(&descriptor, &ProbeResult::default()), 1);
    }
}
