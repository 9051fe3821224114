//! Configuration file: the resolved per-side fields spec.md's Configuration
//! section names, in a line-oriented `key=value` format.
//!
//! A hand-rolled parser rather than a generic format crate: the original
//! format isn't a nested document that benefits from serde, just a flat list
//! of scalar fields (spec.md §6 "Configuration (file)").

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::PdvError;
use crate::{IpV4Addr as CrateIpV4Addr, IpV6Addr as CrateIpV6Addr, IpVersion, MacAddr};

/// Fully resolved run configuration, assembled from the config file plus the
/// CLI's rate/duration/timing parameters (spec.md §6).
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// IP version under test on the forward path.
    pub forward_ip_version: IpVersion,
    /// IP version under test on the reverse path.
    pub reverse_ip_version: IpVersion,
    /// Tester-facing MAC address.
    pub tester_mac: MacAddr,
    /// DUT-facing MAC address.
    pub dut_mac: MacAddr,
    /// Tester's real IPv4 address.
    pub tester_ipv4: CrateIpV4Addr,
    /// Tester's real IPv6 address.
    pub tester_ipv6: CrateIpV6Addr,
    /// DUT's virtual IPv4 address (the translation target).
    pub dut_ipv4: CrateIpV4Addr,
    /// DUT's virtual IPv6 address (the translation target).
    pub dut_ipv6: CrateIpV6Addr,
    /// Background (always-IPv6) tester address.
    pub background_tester_ipv6: CrateIpV6Addr,
    /// Background (always-IPv6) DUT address.
    pub background_dut_ipv6: CrateIpV6Addr,
    /// Number of destination networks to fan out across, forward direction.
    pub num_dest_nets_forward: u16,
    /// Number of destination networks to fan out across, reverse direction.
    pub num_dest_nets_reverse: u16,
    /// Whether the forward direction is active.
    pub forward: bool,
    /// Whether the reverse direction is active.
    pub reverse: bool,
    /// Whether the NIC should be placed in promiscuous mode (production I/O
    /// concern; tracked here so the config round-trips, unused by the
    /// `ChannelPort` test double).
    pub promiscuous: bool,
    /// CPU core index for the forward sender.
    pub forward_sender_core: Option<usize>,
    /// CPU core index for the forward receiver.
    pub forward_receiver_core: Option<usize>,
    /// CPU core index for the reverse sender.
    pub reverse_sender_core: Option<usize>,
    /// CPU core index for the reverse receiver.
    pub reverse_receiver_core: Option<usize>,
    /// Number of memory channels on the target NIC (production I/O tuning
    /// knob, carried through unchanged).
    pub memory_channels: u8,
}

fn parse_ip_version(s: &str) -> Result<IpVersion, PdvError> {
    match s {
        "4" | "v4" | "ipv4" => Ok(IpVersion::V4),
        "6" | "v6" | "ipv6" => Ok(IpVersion::V6),
        other => Err(PdvError::Configuration(format!("invalid ip version: {other}"))),
    }
}

fn parse_mac(s: &str) -> Result<MacAddr, PdvError> {
    let mut bytes = [0_u8; 6];
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(PdvError::Configuration(format!("invalid mac address: {s}")));
    }
    for (i, part) in parts.iter().enumerate() {
        bytes[i] = u8::from_str_radix(part, 16)
            .map_err(|_| PdvError::Configuration(format!("invalid mac address: {s}")))?;
    }
    Ok(MacAddr::new(bytes))
}

fn parse_ipv4(s: &str) -> Result<CrateIpV4Addr, PdvError> {
    let addr = Ipv4Addr::from_str(s).map_err(|_| PdvError::Configuration(format!("invalid ipv4 address: {s}")))?;
    Ok(CrateIpV4Addr::new(addr.octets()))
}

fn parse_ipv6(s: &str) -> Result<CrateIpV6Addr, PdvError> {
    let addr = Ipv6Addr::from_str(s).map_err(|_| PdvError::Configuration(format!("invalid ipv6 address: {s}")))?;
    Ok(CrateIpV6Addr::new(addr.octets()))
}

fn parse_bool(s: &str) -> Result<bool, PdvError> {
    match s {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(PdvError::Configuration(format!("invalid boolean: {other}"))),
    }
}

fn field<'a>(map: &'a HashMap<String, String>, key: &str) -> Result<&'a str, PdvError> {
    map.get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PdvError::Configuration(format!("missing required field: {key}")))
}

fn parse_num<T: FromStr>(map: &HashMap<String, String>, key: &str) -> Result<T, PdvError> {
    field(map, key)?
        .parse::<T>()
        .map_err(|_| PdvError::Configuration(format!("invalid numeric value for {key}")))
}

fn parse_core(map: &HashMap<String, String>, key: &str) -> Option<usize> {
    map.get(key).and_then(|s| s.parse::<usize>().ok())
}

/// Parse a `key=value`-per-line configuration file's text into a
/// [`RunConfig`]. Blank lines and lines starting with `#` are ignored.
pub fn parse(text: &str) -> Result<RunConfig, PdvError> {
    let mut map = HashMap::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            PdvError::Configuration(format!("line {}: expected key=value, got {line:?}", lineno + 1))
        })?;
        map.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(RunConfig {
        forward_ip_version: parse_ip_version(field(&map, "forward_ip_version")?)?,
        reverse_ip_version: parse_ip_version(field(&map, "reverse_ip_version")?)?,
        tester_mac: parse_mac(field(&map, "tester_mac")?)?,
        dut_mac: parse_mac(field(&map, "dut_mac")?)?,
        tester_ipv4: parse_ipv4(field(&map, "tester_ipv4")?)?,
        tester_ipv6: parse_ipv6(field(&map, "tester_ipv6")?)?,
        dut_ipv4: parse_ipv4(field(&map, "dut_ipv4")?)?,
        dut_ipv6: parse_ipv6(field(&map, "dut_ipv6")?)?,
        background_tester_ipv6: parse_ipv6(field(&map, "background_tester_ipv6")?)?,
        background_dut_ipv6: parse_ipv6(field(&map, "background_dut_ipv6")?)?,
        num_dest_nets_forward: parse_num(&map, "num_dest_nets_forward")?,
        num_dest_nets_reverse: parse_num(&map, "num_dest_nets_reverse")?,
        forward: parse_bool(field(&map, "forward")?)?,
        reverse: parse_bool(field(&map, "reverse")?)?,
        promiscuous: map
            .get("promiscuous")
            .map(|s| parse_bool(s))
            .transpose()?
            .unwrap_or(false),
        forward_sender_core: parse_core(&map, "forward_sender_core"),
        forward_receiver_core: parse_core(&map, "forward_receiver_core"),
        reverse_sender_core: parse_core(&map, "reverse_sender_core"),
        reverse_receiver_core: parse_core(&map, "reverse_receiver_core"),
        memory_channels: map
            .get("memory_channels")
            .map(|s| parse_num_str::<u8>(s))
            .transpose()?
            .unwrap_or(4),
    })
}

fn parse_num_str<T: FromStr>(s: &str) -> Result<T, PdvError> {
    s.parse::<T>()
        .map_err(|_| PdvError::Configuration(format!("invalid numeric value: {s}")))
}
