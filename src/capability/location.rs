//! Location capability (spec §4.4.5): `3GPP-LAC-CI`/`GPS-RAW`/`GPS-NMEA`/
//! `GPS-UNMANAGED` source bits. The generic core only ever offers
//! `3GPP-LAC-CI`, and only for a 3GPP modem — NMEA/raw sources need a
//! dedicated GPS port a subclass plugin would supply.

use crate::at::network_service::{QueryRegistration, RegDomain};
use crate::capability::CapabilityContext;

/// spec §4.4.5 "Capabilities bitset". Hand-rolled the same way
/// [`crate::modem::CapabilityBits`] is (see DESIGN.md).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationSourceBits(u8);

impl LocationSourceBits {
    pub const LAC_CI: LocationSourceBits = LocationSourceBits(1 << 0);
    pub const GPS_RAW: LocationSourceBits = LocationSourceBits(1 << 1);
    pub const GPS_NMEA: LocationSourceBits = LocationSourceBits(1 << 2);
    pub const GPS_UNMANAGED: LocationSourceBits = LocationSourceBits(1 << 3);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, flag: LocationSourceBits) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn insert(&mut self, flag: LocationSourceBits) {
        self.0 |= flag.0;
    }

    /// Raw bitset value, for callers (e.g. the remote-object interface)
    /// that need the D-Bus `u32` encoding rather than the typed bits.
    pub fn raw(self) -> u8 {
        self.0
    }
}

/// The LAC/CI the 3GPP domains last reported (spec §4.4.5 "refresh
/// LAC/CI"). `None` for a domain that has never registered or doesn't
/// report location with its registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellLocation {
    pub lac: Option<String>,
    pub ci: Option<String>,
}

pub struct LocationCapability {
    ctx: CapabilityContext,
    is_3gpp: bool,
}

impl LocationCapability {
    pub fn new(ctx: CapabilityContext, is_3gpp: bool) -> Self {
        Self { ctx, is_3gpp }
    }

    /// spec §4.4.5 "For the generic core, only `3GPP-LAC-CI` is offered and
    /// only when the modem is 3GPP."
    pub fn supported_sources(&self) -> LocationSourceBits {
        let mut bits = LocationSourceBits::empty();
        if self.is_3gpp {
            bits.insert(LocationSourceBits::LAC_CI);
        }
        bits
    }

    /// spec §4.4.5 "On enable-location: a 3GPP modem re-runs registration
    /// checks to refresh LAC/CI." Checks EPS, then PS, then CS, keeping the
    /// first domain that reports a location, since a modem camped on LTE
    /// reports its LAC/CI there and not on the (dormant) CS domain.
    pub async fn enable(&self) -> CellLocation {
        if !self.is_3gpp {
            return CellLocation::default();
        }
        for domain in [RegDomain::Eps, RegDomain::Ps, RegDomain::Cs] {
            if let Ok(report) = self.ctx.primary.enqueue(&QueryRegistration { domain }).await {
                if report.lac.is_some() || report.ci.is_some() {
                    return CellLocation {
                        lac: report.lac,
                        ci: report.ci,
                    };
                }
            }
        }
        CellLocation::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_3gpp_modem_offers_no_sources() {
        let bits = LocationSourceBits::empty();
        assert!(!bits.contains(LocationSourceBits::LAC_CI));
    }

    #[test]
    fn lac_ci_bit_is_the_only_one_the_generic_core_ever_sets() {
        let mut bits = LocationSourceBits::empty();
        bits.insert(LocationSourceBits::LAC_CI);
        assert!(bits.contains(LocationSourceBits::LAC_CI));
        assert!(!bits.contains(LocationSourceBits::GPS_NMEA));
    }
}
