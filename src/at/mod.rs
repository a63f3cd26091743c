//! AT command definitions (spec §4.4, §6 "AT wire format").
//!
//! Each command is a small struct implementing [`AtCommand`], mirroring the
//! shape of the teacher's `#[derive(AtatCmd)]` structs (command text,
//! per-command timeout, a typed response) without depending on `atat`
//! itself — see `DESIGN.md` for why the Command Queue this crate needs
//! (open-ended command set, cache-key memoization, multi-command sequence
//! contract) is implemented as its own policy layer instead.

pub mod cdma;
pub mod device_lock;
pub mod messaging;
pub mod mobile_control;
pub mod network_service;
pub mod time;
pub mod ussd;

use std::time::Duration;

/// A single AT command: how to render it on the wire and how to parse the
/// terminal response body it produced (spec §3 `Command`).
pub trait AtCommand: Send + Sync {
    type Response: Send + 'static;

    /// The command text, without the `AT` prefix or `\r\n` terminator
    /// (both are added by the queue).
    fn command_text(&self) -> String;

    /// Per-command timeout (spec §3 `Command.timeout`).
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// An optional cache key; commands sharing a key and succeeding once
    /// are served from cache thereafter (§4.2 `enqueue_cached`).
    fn cache_key(&self) -> Option<String> {
        None
    }

    /// Parse the accumulated intermediate response lines (terminal token
    /// already stripped) into the typed response.
    fn parse(&self, lines: &[String]) -> crate::error::Result<Self::Response>;
}

/// Splits a `+CMD: a,b,"c"` style response line into its prefix and the raw
/// comma-separated argument text (quotes and parenthesised groups are left
/// intact for the caller to split further). Shared by every command parser
/// below.
pub fn split_response_prefix<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix).map(|rest| rest.trim_start())
}

/// Splits AT-style arguments on top-level commas, respecting quotes and
/// parentheses so `"a,b"` or `(1,2,3)` are not split internally. This is
/// the parser primitive every `+CMD:` response decoder below is built on.
pub fn split_args(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut current = String::new();

    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '(' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            ',' if !in_quotes && depth == 0 => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    out.push(current);
    out.into_iter().map(|s| s.trim().to_string()).collect()
}

pub fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_args_respects_quotes_and_groups() {
        let args = split_args(r#"2,"Carrier A","CrA","31026",7"#);
        assert_eq!(args, vec!["2", "\"Carrier A\"", "\"CrA\"", "\"31026\"", "7"]);
    }

    #[test]
    fn split_args_respects_nested_parens() {
        let args = split_args(r#"(2,"Carrier A","CrA","31026",7),,(0,1,3,4)"#);
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"1A2B\""), "1A2B");
        assert_eq!(unquote("7"), "7");
    }
}
