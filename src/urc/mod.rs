//! The URC Dispatcher (spec §4.3): per-port `(pattern, handler)`
//! registrations, first-match-wins in registration order.

use std::sync::{Arc, Mutex};

use regex::Regex;

pub type RegistrationId = u64;

/// A frame handler. Invoked synchronously with the frame text still owned
/// by the dispatcher (spec §4.3): handlers must not block and must not
/// enqueue synchronous Commands, though they may enqueue async ones (the
/// handler itself is free to spawn a task that enqueues later).
pub type Handler = Box<dyn Fn(&str) + Send + Sync>;

struct Registration {
    id: RegistrationId,
    pattern: Regex,
    pattern_source: String,
    handler: Handler,
}

/// Owns a port's URC registrations and tries them in order against every
/// frame the Command Queue declines to treat as a response.
#[derive(Clone)]
pub struct UrcDispatcher {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    next_id: RegistrationId,
    registrations: Vec<Registration>,
}

impl Default for UrcDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UrcDispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                registrations: Vec::new(),
            })),
        }
    }

    /// Registers `handler` for frames matching `pattern`. Re-registering
    /// the same pattern text overwrites the existing handler in place
    /// (spec §4.3 "toggle handlers without losing the pattern compilation
    /// cost") rather than appending a second registration.
    pub fn register(&self, pattern: &str, handler: Handler) -> crate::error::Result<RegistrationId> {
        let compiled = Regex::new(pattern)
            .map_err(|e| crate::error::Error::ParseError(format!("bad URC pattern: {e}")))?;

        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .registrations
            .iter_mut()
            .find(|r| r.pattern_source == pattern)
        {
            existing.handler = handler;
            return Ok(existing.id);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.registrations.push(Registration {
            id,
            pattern: compiled,
            pattern_source: pattern.to_string(),
            handler,
        });
        Ok(id)
    }

    pub fn unregister(&self, id: RegistrationId) {
        let mut inner = self.inner.lock().unwrap();
        inner.registrations.retain(|r| r.id != id);
    }

    /// Tries every registration in order; the first whose pattern matches
    /// handles the frame and no other is tried (spec §4.3, invariant I2).
    /// Returns whether any handler fired.
    pub fn dispatch(&self, frame: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        for reg in &inner.registrations {
            if reg.pattern.is_match(frame) {
                (reg.handler)(frame);
                return true;
            }
        }
        tracing::debug!(frame, "unmatched URC, dropped");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn first_match_wins_in_registration_order() {
        let dispatcher = UrcDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = hits.clone();
        dispatcher
            .register(r"^\+CREG", Box::new(move |_| { h1.fetch_add(1, Ordering::SeqCst); }))
            .unwrap();
        let h2 = hits.clone();
        dispatcher
            .register(r"^\+C", Box::new(move |_| { h2.fetch_add(10, Ordering::SeqCst); }))
            .unwrap();

        assert!(dispatcher.dispatch("+CREG: 1,\"1A2B\",\"0000FFFF\",7"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmatched_frame_is_dropped_without_panic() {
        let dispatcher = UrcDispatcher::new();
        assert!(!dispatcher.dispatch("+UNKNOWN: 1"));
    }

    #[test]
    fn re_registering_same_pattern_overwrites_handler() {
        let dispatcher = UrcDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        dispatcher.register(r"^\+CMTI", Box::new(|_| {})).unwrap();
        let h = hits.clone();
        dispatcher
            .register(r"^\+CMTI", Box::new(move |_| { h.fetch_add(1, Ordering::SeqCst); }))
            .unwrap();

        dispatcher.dispatch("+CMTI: \"SM\",3");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
