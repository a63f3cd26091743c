//! Multi-command sequences sharing one completion sink (spec §3
//! `CommandSequence`, §4.2 "Sequence semantics").
//!
//! A `CommandSequence` in this crate is simply a capability method that
//! `.await`s its commands one after another and folds each result through
//! [`SequenceStep`] — Rust's own sequential `await` already gives the
//! "ordered list of Commands sharing a single completion sink" shape spec
//! §3 describes, so there is no separate dynamic sequence-runner type; the
//! value this module adds is the shared decision table for what a step's
//! outcome means for the sequence as a whole.

use crate::error::{Error, ErrorKind};

/// What a sequence step's processor decides after one command completes
/// (spec §4.2).
pub enum SequenceStep<T> {
    Continue,
    TerminalOk(T),
    TerminalErr(Error),
    CommandNotSupported,
}

/// Folds one step's outcome against its position in the sequence (spec
/// §4.2): `Continue` and a non-last `CommandNotSupported` ask the caller to
/// keep going; a non-last `TerminalErr` of kind `NotSupported`, or a
/// `+CME ERROR` [`Error::is_cme_unsupported`] code, is silently downgraded
/// to "keep going" too (the spec's CME-unsupported carve-out); anything
/// else is the sequence's final result.
pub fn fold_step<T>(step: SequenceStep<T>, is_last: bool) -> ControlFlow<T> {
    match step {
        SequenceStep::Continue => ControlFlow::Continue,
        SequenceStep::CommandNotSupported => {
            if is_last {
                ControlFlow::Done(Err(Error::NotSupported))
            } else {
                ControlFlow::Continue
            }
        }
        SequenceStep::TerminalOk(value) => ControlFlow::Done(Ok(value)),
        SequenceStep::TerminalErr(e)
            if !is_last && (e.kind() == ErrorKind::NotSupported || e.is_cme_unsupported()) =>
        {
            ControlFlow::Continue
        }
        SequenceStep::TerminalErr(e) => ControlFlow::Done(Err(e)),
    }
}

pub enum ControlFlow<T> {
    Continue,
    Done(crate::error::Result<T>),
}

/// The overall outcome type a sequence's caller matches on; kept distinct
/// from `Result` so a future call site can attach sequence-specific
/// diagnostics without changing every command's error type.
pub type SequenceOutcome<T> = crate::error::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_not_supported_continues_unless_last() {
        let step: SequenceStep<()> = SequenceStep::CommandNotSupported;
        assert!(matches!(fold_step(step, false), ControlFlow::Continue));

        let step: SequenceStep<()> = SequenceStep::CommandNotSupported;
        assert!(matches!(fold_step(step, true), ControlFlow::Done(Err(_))));
    }

    #[test]
    fn not_supported_terminal_err_is_swallowed_on_non_last_command() {
        let step: SequenceStep<()> = SequenceStep::TerminalErr(Error::NotSupported);
        assert!(matches!(fold_step(step, false), ControlFlow::Continue));
    }

    #[test]
    fn not_supported_terminal_err_is_fatal_on_last_command() {
        let step: SequenceStep<()> = SequenceStep::TerminalErr(Error::NotSupported);
        assert!(matches!(fold_step(step, true), ControlFlow::Done(Err(_))));
    }

    #[test]
    fn cme_unsupported_code_is_swallowed_on_non_last_command() {
        let step: SequenceStep<()> = SequenceStep::TerminalErr(Error::CmeError(4));
        assert!(matches!(fold_step(step, false), ControlFlow::Continue));
    }

    #[test]
    fn cme_unsupported_code_is_fatal_on_last_command() {
        let step: SequenceStep<()> = SequenceStep::TerminalErr(Error::CmeError(4));
        assert!(matches!(fold_step(step, true), ControlFlow::Done(Err(_))));
    }

    #[test]
    fn terminal_ok_ends_the_sequence_immediately() {
        let step = SequenceStep::TerminalOk(42);
        assert!(matches!(fold_step(step, false), ControlFlow::Done(Ok(42))));
    }
}
