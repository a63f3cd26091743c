//! The `huawei` vendor-quirk plugin (spec §4.5, §4.6: named explicitly as
//! the worked example of a data-driven plugin). Illustrative only — not an
//! exhaustive vendor table (an explicit Non-goal).
//!
//! Huawei's AT dialect answers unsolicited-mode-report queries with
//! `^CURC` and exposes a combined port-role query (`^GETPORTMODE`) that
//! tells the Orchestrator which of a multi-port composite device is
//! Primary/Secondary/NDIS without needing udev driver heuristics.

use crate::plugin::{AllowList, Plugin, PortDescriptor, ProbeResult};

const HUAWEI_VENDOR_ID: &str = "12d1";

pub struct HuaweiPlugin {
    allow_list: AllowList,
}

impl HuaweiPlugin {
    pub fn new() -> Self {
        Self {
            allow_list: AllowList {
                vendor_ids: vec![HUAWEI_VENDOR_ID.to_string()],
                ..Default::default()
            },
        }
    }
}

impl Default for HuaweiPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for HuaweiPlugin {
    fn name(&self) -> &'static str {
        "huawei"
    }

    fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    fn level(&self, _descriptor: &PortDescriptor, probe: &ProbeResult) -> u8 {
        if probe.is_lte_capable() {
            20
        } else {
            15
        }
    }

    /// spec §4.6 "Huawei `^CURC=0; ^GETPORTMODE`" — silences the vendor's
    /// own unsolicited status reports (which would otherwise collide with
    /// the generic URC Dispatcher's expectations) before the fixed AT probe
    /// sequence runs.
    fn custom_init_commands(&self) -> Vec<String> {
        vec!["^CURC=0".to_string(), "^GETPORTMODE".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Subsystem;

    #[test]
    fn only_matches_huawei_vendor_id() {
        let plugin = HuaweiPlugin::new();
        let huawei = PortDescriptor {
            subsystem: Subsystem::Tty,
            vendor_id: Some(HUAWEI_VENDOR_ID.to_string()),
            ..Default::default()
        };
        let other = PortDescriptor {
            subsystem: Subsystem::Tty,
            vendor_id: Some("0000".to_string()),
            ..Default::default()
        };
        assert!(plugin.allow_list().matches(&huawei));
        assert!(!plugin.allow_list().matches(&other));
    }

    #[test]
    fn custom_init_silences_vendor_urcs_before_probing() {
        let plugin = HuaweiPlugin::new();
        assert_eq!(plugin.custom_init_commands(), vec!["^CURC=0", "^GETPORTMODE"]);
    }
}
