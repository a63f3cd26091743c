//! 3GPP-USSD capability (spec §4.4.2 USSD).

use std::sync::Mutex;

use crate::at::ussd::{CancelUssd, SendUssd, UssdNotification};
use crate::capability::CapabilityContext;
use crate::charset::Charset;
use crate::error::Result;
use crate::queue::CancellationToken;

#[derive(Default)]
struct UssdState {
    /// The last variant that worked, memoized per modem (spec §4.4.2
    /// "memoizes the working variant per modem").
    gsm7_hex_preferred: Option<bool>,
    current_send: Option<CancellationToken>,
}

impl UssdState {
    /// Folds an unsolicited `+CUSD:` frame. Per Open Question 2 (undefined
    /// in the source), a `+CUSD: 0` racing a local cancel is treated as the
    /// cancel completing, not a fresh notification — distinguished by
    /// whether this session's own cancellation token is already cancelled.
    fn on_unsolicited(&mut self, notif: &UssdNotification) -> UnsolicitedDisposition {
        if let Some(token) = &self.current_send {
            if token.is_cancelled() {
                self.current_send = None;
                return UnsolicitedDisposition::WasCancellation;
            }
        }
        UnsolicitedDisposition::NetworkNotification(notif.clone())
    }
}

pub struct UssdCapability {
    ctx: CapabilityContext,
    state: Mutex<UssdState>,
}

impl UssdCapability {
    pub fn new(ctx: CapabilityContext) -> Self {
        Self {
            ctx,
            state: Mutex::new(UssdState::default()),
        }
    }

    /// spec §4.4.2 "The interface first tries the last-known-good variant,
    /// falls back on error, and memoizes the working variant per modem."
    pub async fn send(&self, text: &str, charset: Charset) -> Result<UssdNotification> {
        let preferred = self.state.lock().unwrap().gsm7_hex_preferred;
        let cancel = CancellationToken::new();
        self.state.lock().unwrap().current_send = Some(cancel.clone());

        let order: [bool; 2] = match preferred {
            Some(true) => [true, false],
            _ => [false, true],
        };

        let mut last_err = None;
        for gsm7_hex_encode in order {
            let cmd = SendUssd {
                text: text.to_string(),
                charset,
                gsm7_hex_encode,
            };
            match self.ctx.primary.enqueue_cancellable(&cmd, cancel.clone()).await {
                Ok(notif) => {
                    self.state.lock().unwrap().gsm7_hex_preferred = Some(gsm7_hex_encode);
                    return Ok(notif);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap())
    }

    /// User-initiated cancel (spec §4.4.2; Open Question 2). Cancelling
    /// marks the in-flight send's token so an unsolicited `+CUSD: 0` that
    /// arrives for it is attributed to this cancel rather than treated as a
    /// fresh network notification by [`Self::on_unsolicited`].
    pub async fn cancel(&self) -> Result<()> {
        if let Some(token) = self.state.lock().unwrap().current_send.take() {
            token.cancel();
        }
        self.ctx.primary.enqueue(&CancelUssd).await
    }

    pub fn on_unsolicited(&self, notif: &UssdNotification) -> UnsolicitedDisposition {
        self.state.lock().unwrap().on_unsolicited(notif)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsolicitedDisposition {
    WasCancellation,
    NetworkNotification(UssdNotification),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::at::ussd::UssdSessionState;

    fn sample_notification() -> UssdNotification {
        UssdNotification {
            state: UssdSessionState::Terminated,
            text: None,
            dcs: None,
        }
    }

    #[test]
    fn unsolicited_with_no_cancel_in_flight_is_a_network_notification() {
        let mut state = UssdState::default();
        let disposition = state.on_unsolicited(&sample_notification());
        assert_eq!(
            disposition,
            UnsolicitedDisposition::NetworkNotification(sample_notification())
        );
    }

    #[test]
    fn unsolicited_during_a_cancelled_send_is_attributed_to_the_cancel() {
        let mut state = UssdState::default();
        let token = CancellationToken::new();
        token.cancel();
        state.current_send = Some(token);
        let disposition = state.on_unsolicited(&sample_notification());
        assert_eq!(disposition, UnsolicitedDisposition::WasCancellation);
    }

    #[test]
    fn uncancelled_in_flight_token_still_yields_a_network_notification() {
        let mut state = UssdState::default();
        state.current_send = Some(CancellationToken::new());
        let disposition = state.on_unsolicited(&sample_notification());
        assert_eq!(
            disposition,
            UnsolicitedDisposition::NetworkNotification(sample_notification())
        );
    }
}
