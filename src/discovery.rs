//! Port discovery (spec §6, "Port discovery interface (consumed)"): the
//! `PortAppeared`/`PortRemoved` event stream the core subscribes to, a
//! `udev`-backed implementation, and a scripted test double.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::port::Subsystem;

/// spec §6 "`PortAppeared { subsystem, name, driver, parent_path,
/// properties: map<string,string> }` / `PortRemoved { subsystem, name }`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    PortAppeared {
        subsystem: Subsystem,
        name: String,
        driver: String,
        parent_path: String,
        properties: HashMap<String, String>,
    },
    PortRemoved {
        subsystem: Subsystem,
        name: String,
    },
}

/// The consumed port-discovery interface. `subscribe` takes `self` by
/// owned `Box` rather than exposing an `async fn` on the trait (nothing in
/// the retrieved pack reaches for `async-trait`): implementations spawn
/// whatever background work they need and hand back a channel.
pub trait PortDiscovery: Send + 'static {
    fn subscribe(self: Box<Self>) -> mpsc::UnboundedReceiver<DiscoveryEvent>;
}

/// Listens on a `udev` monitor socket filtered to the subsystems spec §6
/// names (`tty`, `usb`, `usbmisc`, `wwan`) and translates Add/Remove
/// events, reading `ID_VENDOR_ID`/`ID_MODEL_ID`/`ID_USB_INTERFACE_NUM`/
/// `ID_MM_*` off the device's property table.
pub struct UdevPortDiscovery;

impl UdevPortDiscovery {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UdevPortDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl PortDiscovery for UdevPortDiscovery {
    fn subscribe(self: Box<Self>) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            if let Err(e) = run_udev_monitor(tx).await {
                tracing::error!(error = %e, "udev monitor terminated");
            }
        });
        rx
    }
}

async fn run_udev_monitor(tx: mpsc::UnboundedSender<DiscoveryEvent>) -> Result<()> {
    use tokio::io::unix::AsyncFd;

    let socket = udev::MonitorBuilder::new()
        .and_then(|b| b.match_subsystem("tty"))
        .and_then(|b| b.match_subsystem("usb"))
        .and_then(|b| b.match_subsystem("usbmisc"))
        .and_then(|b| b.match_subsystem("wwan"))
        .and_then(|b| b.listen())
        .map_err(|e| Error::Other(format!("udev monitor setup: {e}")))?;

    let mut async_fd = AsyncFd::new(socket)?;

    loop {
        let mut guard = async_fd.readable_mut().await?;
        loop {
            match guard.get_inner_mut().next() {
                Some(event) => {
                    if let Some(discovered) = translate_event(&event) {
                        if tx.send(discovered).is_err() {
                            return Ok(());
                        }
                    }
                }
                None => break,
            }
        }
        guard.clear_ready();
    }
}

fn translate_event(event: &udev::Event) -> Option<DiscoveryEvent> {
    let name = event.sysname().to_string_lossy().to_string();
    let subsystem = map_subsystem(event.subsystem()?.to_str()?)?;

    match event.event_type() {
        udev::EventType::Remove | udev::EventType::Unbind => {
            Some(DiscoveryEvent::PortRemoved { subsystem, name })
        }
        udev::EventType::Add | udev::EventType::Bind | udev::EventType::Change => {
            let driver = event
                .driver()
                .map(|d| d.to_string_lossy().to_string())
                .unwrap_or_default();
            let parent_path = event
                .parent()
                .and_then(|p| p.syspath().to_str().map(str::to_string))
                .unwrap_or_default();
            let properties = event
                .properties()
                .map(|prop| {
                    (
                        prop.name().to_string_lossy().to_string(),
                        prop.value().to_string_lossy().to_string(),
                    )
                })
                .collect();
            Some(DiscoveryEvent::PortAppeared {
                subsystem,
                name,
                driver,
                parent_path,
                properties,
            })
        }
        udev::EventType::Unknown => None,
    }
}

fn map_subsystem(s: &str) -> Option<Subsystem> {
    match s {
        "tty" => Some(Subsystem::Tty),
        "net" => Some(Subsystem::Net),
        "usbmisc" => Some(Subsystem::UsbMisc),
        "wwan" => Some(Subsystem::Wdm),
        _ => None,
    }
}

/// A canned event sequence, for orchestrator/Plugin Router tests that
/// don't want a real udev socket.
pub struct ScriptedPortDiscovery {
    events: Vec<DiscoveryEvent>,
}

impl ScriptedPortDiscovery {
    pub fn new(events: Vec<DiscoveryEvent>) -> Self {
        Self { events }
    }
}

impl PortDiscovery for ScriptedPortDiscovery {
    fn subscribe(self: Box<Self>) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in self.events {
            let _ = tx.send(event);
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_discovery_replays_events_in_order() {
        let events = vec![
            DiscoveryEvent::PortAppeared {
                subsystem: Subsystem::Tty,
                name: "ttyUSB0".into(),
                driver: "option".into(),
                parent_path: "/sys/devices/foo".into(),
                properties: HashMap::new(),
            },
            DiscoveryEvent::PortRemoved {
                subsystem: Subsystem::Tty,
                name: "ttyUSB0".into(),
            },
        ];
        let mut rx = Box::new(ScriptedPortDiscovery::new(events.clone())).subscribe();
        assert_eq!(rx.recv().await, Some(events[0].clone()));
        assert_eq!(rx.recv().await, Some(events[1].clone()));
        assert_eq!(rx.recv().await, None);
    }
}
