//! SIM data model (spec §3 `SIM`).

use crate::at::device_lock::PinStatus;

/// spec §3 "Attributes: identifier (ICCID), IMSI, operator-id
/// (MCC+MNC), operator-name, pin-lock-state." SPEC_FULL.md supplements
/// this with `operator_code`/`emergency_numbers` (`+CRSM`/`+CPOL`-derived
/// data most ModemManager plugins also surface) since they're needed to
/// answer "which network is this SIM home to" without a live registration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Sim {
    pub iccid: Option<String>,
    pub imsi: Option<String>,
    pub operator_code: Option<String>,
    pub operator_name: Option<String>,
    pub pin_lock_state: PinLockState,
    pub emergency_numbers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum PinLockState {
    #[default]
    Unknown,
    Unlocked,
    SimPin,
    SimPuk,
    SimPin2,
    SimPuk2,
    PhSimPin,
    PhNetPin,
}

impl From<PinStatus> for PinLockState {
    fn from(status: PinStatus) -> Self {
        match status {
            PinStatus::Ready => PinLockState::Unlocked,
            PinStatus::SimPin => PinLockState::SimPin,
            PinStatus::SimPuk => PinLockState::SimPuk,
            PinStatus::SimPin2 => PinLockState::SimPin2,
            PinStatus::SimPuk2 => PinLockState::SimPuk2,
            PinStatus::PhSimPin => PinLockState::PhSimPin,
            PinStatus::PhNetPin => PinLockState::PhNetPin,
            PinStatus::Unknown => PinLockState::Unknown,
        }
    }
}

impl Sim {
    pub fn is_locked(&self) -> bool {
        !matches!(self.pin_lock_state, PinLockState::Unlocked | PinLockState::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_is_not_locked() {
        let sim = Sim {
            pin_lock_state: PinStatus::Ready.into(),
            ..Default::default()
        };
        assert!(!sim.is_locked());
    }

    #[test]
    fn sim_pin_is_locked() {
        let sim = Sim {
            pin_lock_state: PinStatus::SimPin.into(),
            ..Default::default()
        };
        assert!(sim.is_locked());
    }
}
