//! Time capability: drives `+CCLK?` once per Enable and folds the
//! `+CTZV`/`+CIEV` time-zone URCs into the same snapshot (SPEC_FULL.md §4.4
//! "Time", grounded on `original_source`'s `mm-iface-modem-time.c`).

use crate::at::time::{parse_cclk_body, parse_ctzv_body, NetworkTime, QueryNetworkTime};
use crate::capability::CapabilityContext;
use std::sync::Mutex;

pub struct TimeCapability {
    ctx: CapabilityContext,
    last: Mutex<Option<NetworkTime>>,
}

impl TimeCapability {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self {
            ctx,
            last: Mutex::new(None),
        }
    }

    /// Queries `+CCLK?` once and publishes the result. Errors here are
    /// non-fatal to Enable (spec §7 "Location / Messaging / Time / Firmware
    /// interface errors during Enable do not fail the Modem").
    pub async fn enable(&self) -> Option<NetworkTime> {
        let time = self.ctx.primary.enqueue(&QueryNetworkTime).await.ok();
        *self.last.lock().unwrap() = time.clone();
        time
    }

    pub fn current(&self) -> Option<NetworkTime> {
        self.last.lock().unwrap().clone()
    }

    /// `+CTZV: <quarter-hours>` — updates only the offset, keeping whatever
    /// date/time string was last known.
    pub fn on_ctzv(&self, body: &str) {
        let Some(offset) = parse_ctzv_body(body) else {
            return;
        };
        let mut guard = self.last.lock().unwrap();
        match guard.as_mut() {
            Some(time) => time.tz_offset_minutes = Some(offset),
            None => {
                *guard = Some(NetworkTime {
                    utc: String::new(),
                    tz_offset_minutes: Some(offset),
                })
            }
        }
    }

    /// `+CIEV: <ind>,<value>` is the generic indicator-event URC; a time
    /// subclass plugin that maps one of its indices to the time zone would
    /// pre-extract the body and call this the same as [`Self::on_ctzv`].
    /// The generic core's own `+CMER` setup (spec §4.4.2) never declares a
    /// time-indicator index, so this path is unused by the core today.
    pub fn on_cclk_urc(&self, body: &str) {
        if let Ok(time) = parse_cclk_body(body) {
            *self.last.lock().unwrap() = Some(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctzv_update_preserves_prior_datetime() {
        let mut last = Some(NetworkTime {
            utc: "24/01/15,10:30:00".into(),
            tz_offset_minutes: Some(120),
        });
        if let Some(t) = last.as_mut() {
            t.tz_offset_minutes = Some(-60);
        }
        assert_eq!(last.unwrap().utc, "24/01/15,10:30:00");
    }
}
