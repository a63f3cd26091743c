//! 3GPP capability (spec §4.4.2): registration reporting/checking,
//! network scan, register-in-network, facility locks.

use std::collections::HashMap;

use crate::at::device_lock::{FacilityLockState, QueryFacilityLock, QuerySupportedFacilities};
use crate::at::network_service::{
    QueryRegistration, RegDomain, RegisterInNetwork, ScanNetworks, ScannedOperator, SetIndicatorEvents,
    SetRegistrationReporting,
};
use crate::capability::CapabilityContext;
use crate::error::Result;
use crate::queue::SequenceStep;
use crate::registration::{DomainRegistration, RegistrationState};

pub struct ThreeGppCapability {
    ctx: CapabilityContext,
}

const DOMAINS: [RegDomain; 3] = [RegDomain::Cs, RegDomain::Ps, RegDomain::Eps];

impl ThreeGppCapability {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self { ctx }
    }

    /// spec §4.4.2 Enable steps 1-2. Neither step treats "unsupported" as
    /// fatal — the modem simply doesn't get that reporting mode.
    pub async fn enable(&self) -> Result<()> {
        let q = &self.ctx.primary;

        // `+CMER=3,0,0,1`, falling back to `+CMER=3,0,0,0` when the modem
        // rejects the richer form — a real two-step CommandSequence (spec
        // §3/§4.2), not a hand-rolled if/else.
        let _: Result<()> = q
            .enqueue_sequence(vec![
                Box::pin(async {
                    // Any failure here (not just a NotSupported-kind one)
                    // falls back to the plainer form, hence `CommandNotSupported`
                    // rather than `TerminalErr` — this call site doesn't care
                    // which specific error the modem returned.
                    match q.enqueue(&SetIndicatorEvents { with_ciev: true }).await {
                        Ok(()) => SequenceStep::TerminalOk(()),
                        Err(_) => SequenceStep::CommandNotSupported,
                    }
                }),
                Box::pin(async {
                    // Last step: accept errors rather than failing Enable.
                    let _ = q.enqueue(&SetIndicatorEvents { with_ciev: false }).await;
                    SequenceStep::TerminalOk(())
                }),
            ])
            .await;

        for domain in DOMAINS {
            if q
                .enqueue(&SetRegistrationReporting {
                    domain,
                    with_location: true,
                })
                .await
                .is_err()
            {
                let _ = q
                    .enqueue(&SetRegistrationReporting {
                        domain,
                        with_location: false,
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// spec §4.4.2 "Registration check": re-issue `+CxREG?` in parallel —
    /// strictly round-robin single-flight on the primary port, so this
    /// awaits each domain in turn rather than actually racing them.
    pub async fn check_registration(&self) -> DomainRegistration {
        let mut agg = DomainRegistration::default();
        for domain in DOMAINS {
            if let Ok(report) = self.ctx.primary.enqueue(&QueryRegistration { domain }).await {
                agg.set(domain, RegistrationState::from_raw_stat(report.stat));
            }
        }
        agg
    }

    pub async fn scan_networks(&self) -> Result<Vec<ScannedOperator>> {
        self.ctx.primary.enqueue(&ScanNetworks).await
    }

    /// spec §4.4.2 "Register-in-network".
    pub async fn register(&self, operator_id: Option<String>) -> Result<()> {
        self.ctx.primary.enqueue(&RegisterInNetwork { operator_id }).await
    }

    /// spec §4.4.2 "Facility-locks load": errors on a single facility are
    /// recorded as unknown, never fail the batch.
    pub async fn load_facility_locks(&self) -> HashMap<String, FacilityLockState> {
        let q = &self.ctx.primary;
        let facilities = q.enqueue_cached(&QuerySupportedFacilities).await.unwrap_or_default();

        let mut states = HashMap::new();
        for facility in facilities {
            let state = q
                .enqueue(&QueryFacilityLock {
                    facility: facility.clone(),
                })
                .await
                .unwrap_or(FacilityLockState::Unknown);
            states.insert(facility, state);
        }
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_list_covers_cs_ps_eps() {
        assert_eq!(DOMAINS, [RegDomain::Cs, RegDomain::Ps, RegDomain::Eps]);
    }
}
