//! Command-line interface: the positional/flagged test parameters from
//! spec.md §6 "Command line (positional)".
//!
//! Grounded in `rusty-comms`'s `src/cli.rs`: `clap`'s derive API, a small
//! `styles()` helper for consistent `--help` formatting, one doc comment per
//! field describing its role and any derived/validated relationship to the
//! others.

use clap::{
    builder::styling::{AnsiColor, Styles},
    Parser,
};

use crate::error::PdvError;

/// Defines the styles for the help message.
fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// PDV tester: measures packet delay variation across a stateless IP/ICMP
/// translator, per RFC 8219 / RFC 5481.
///
/// Sends a timed stream of UDP test frames, timestamps transmission and
/// reception at hardware-clock resolution, and reports Dmin, Dmax, D99.9,
/// and PDV = D99.9 - Dmin for each active direction.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Path to the configuration file describing addressing, MACs, and
    /// per-direction enable flags (spec.md §6 "Configuration (file)").
    #[arg(long)]
    pub config: std::path::PathBuf,

    /// IPv6 frame size in bytes, including the 4-byte FCS. The IPv4 frame
    /// size is derived as `ipv6_frame_size - 20` (spec.md §6).
    #[arg(long)]
    pub ipv6_frame_size: u16,

    /// Frames per second to send on each active direction.
    #[arg(long)]
    pub frame_rate: u32,

    /// Test duration, in seconds.
    #[arg(long)]
    pub duration: u16,

    /// Extra time, in milliseconds, the receiver waits past the sender's
    /// scheduled finish before giving up on stragglers (spec.md §6, 0..60000).
    #[arg(long)]
    pub global_timeout: u16,

    /// Modulus for the foreground/background class decision: a frame is
    /// foreground if `frame_index % n < m` (spec.md §4.3 step 1).
    #[arg(long)]
    pub n: u64,

    /// Foreground count within each `n`-frame window.
    #[arg(long)]
    pub m: u64,

    /// Late-frame timeout in milliseconds; `0` selects full-PDV mode where
    /// every arrival (however late) counts toward the distribution
    /// (spec.md §4.5).
    #[arg(long, default_value_t = 0)]
    pub frame_timeout: u64,
}

impl Args {
    /// Derived IPv4 frame size.
    pub fn ipv4_frame_size(&self) -> u16 {
        self.ipv6_frame_size - 20
    }

    /// Validate cross-field constraints spec.md §6 states explicitly:
    /// `frame_timeout < 1000*duration + global_timeout`, and `m <= n`.
    pub fn validate(&self) -> Result<(), PdvError> {
        if self.m > self.n {
            return Err(PdvError::Configuration(format!(
                "m ({}) must not exceed n ({})",
                self.m, self.n
            )));
        }
        if self.n == 0 {
            return Err(PdvError::Configuration("n must be at least 1".to_string()));
        }
        if self.ipv6_frame_size < 20 {
            return Err(PdvError::Configuration(
                "ipv6_frame_size must be at least 20 bytes larger than the smallest valid IPv4 frame".to_string(),
            ));
        }
        let limit_ms = 1000_u64 * self.duration as u64 + self.global_timeout as u64;
        if self.frame_timeout != 0 && self.frame_timeout >= limit_ms {
            return Err(PdvError::Configuration(format!(
                "frame_timeout ({}) must be less than 1000*duration + global_timeout ({})",
                self.frame_timeout, limit_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from([
            "pdvtest",
            "--config",
            "run.conf",
            "--ipv6-frame-size",
            "84",
            "--frame-rate",
            "1000",
            "--duration",
            "10",
            "--global-timeout",
            "2",
            "--n",
            "10",
            "--m",
            "9",
        ])
    }

    #[test]
    fn parses_required_fields_and_derives_ipv4_size() {
        let args = base_args();
        assert_eq!(args.ipv6_frame_size, 84);
        assert_eq!(args.ipv4_frame_size(), 64);
        assert_eq!(args.frame_timeout, 0);
    }

    #[test]
    fn rejects_m_greater_than_n() {
        let mut args = base_args();
        args.m = 11;
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_frame_timeout_too_close_to_total_budget() {
        let mut args = base_args();
        // duration=10, global_timeout=2 -> limit_ms = 10_002
        args.frame_timeout = 10_002;
        assert!(args.validate().is_err());
    }

    #[test]
    fn accepts_frame_timeout_comfortably_within_budget() {
        let mut args = base_args();
        args.frame_timeout = 500;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn zero_frame_timeout_always_valid() {
        let args = base_args();
        assert!(args.validate().is_ok());
    }
}
