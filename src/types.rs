//! Data model shared by the capability layer, the normalizer and the registry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// IP address family selecting which query filter and which row field is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::IPv4 => "IPv4",
            AddressFamily::IPv6 => "IPv6",
        }
    }

    /// Maximum prefix length for this family
    pub fn max_prefix_len(&self) -> u8 {
        match self {
            AddressFamily::IPv4 => 32,
            AddressFamily::IPv6 => 128,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::IPv4,
            IpAddr::V6(_) => AddressFamily::IPv6,
        }
    }

    pub fn matches(&self, addr: &IpAddr) -> bool {
        Self::of(addr) == *self
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IPv4" => Ok(AddressFamily::IPv4),
            "IPv6" => Ok(AddressFamily::IPv6),
            other => Err(format!("expected \"IPv4\" or \"IPv6\", got \"{}\"", other)),
        }
    }
}

/// Administrative state of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminStatus {
    Up,
    Down,
}

impl From<bool> for AdminStatus {
    fn from(enabled: bool) -> Self {
        if enabled {
            AdminStatus::Up
        } else {
            AdminStatus::Down
        }
    }
}

// === Raw capability records ===

/// Adapter as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    pub name: String,
    /// Stable OS index, used for ordering and for the address join
    pub index: Option<u32>,
    /// Explicit administrative status, when the OS reports one
    pub admin_status: Option<AdminStatus>,
    /// Fallback "enabled" flag
    pub enabled: Option<bool>,
    /// Raw OS operational state
    pub oper_status: String,
}

/// One address assigned to an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub interface_name: String,
    pub interface_index: Option<u32>,
    pub address: IpAddr,
    pub prefix_len: u8,
}

/// One routing table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub destination: String,
    pub next_hop: Option<String>,
    pub interface_alias: String,
    pub metric: u32,
}

/// One neighbor cache (ARP / NDP) entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborRecord {
    pub address: IpAddr,
    pub link_layer_address: Option<String>,
    pub interface_alias: String,
    pub state: String,
}

/// One hop of a traced path
#[derive(Debug, Clone, PartialEq)]
pub struct HopRecord {
    pub hop: u32,
    /// First responding address, `None` when every probe timed out
    pub address: Option<IpAddr>,
    pub probes: Vec<ProbeResult>,
}

/// Outcome of a single reachability probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeResult {
    /// Response time in milliseconds
    Reply(f64),
    Timeout,
}

// === Normalized result rows ===

/// Canonical interface row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "AdminStatus")]
    pub admin_status: AdminStatus,
    #[serde(rename = "OperStatus")]
    pub oper_status: String,
    #[serde(rename = "IPv4")]
    pub ipv4: Vec<String>,
    #[serde(rename = "IPv6")]
    pub ipv6: Vec<String>,
}

/// Canonical route row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRow {
    #[serde(rename = "Destination")]
    pub destination: String,
    #[serde(rename = "NextHop")]
    pub next_hop: String,
    #[serde(rename = "InterfaceAlias")]
    pub interface_alias: String,
    #[serde(rename = "RouteMetric")]
    pub route_metric: u32,
}

/// Canonical neighbor row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRow {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    #[serde(rename = "LinkLayerAddress")]
    pub link_layer_address: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "InterfaceAlias")]
    pub interface_alias: String,
}

/// Canonical traceroute hop row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopRow {
    #[serde(rename = "Hop")]
    pub hop: u32,
    /// Responding address, `*` when the hop never answered
    #[serde(rename = "Address")]
    pub address: String,
    /// Mean of the answered probes; null when none answered
    #[serde(rename = "AvgLatencyMs")]
    pub avg_latency_ms: Option<f64>,
}

/// Reachability summary over a batch of probes
#[derive(Debug, Clone, PartialEq)]
pub enum PingSummary {
    Replied {
        target: String,
        sent: u32,
        received: u32,
        loss_percent: u32,
        avg_latency_ms: f64,
    },
    NoReply,
}

impl fmt::Display for PingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingSummary::Replied {
                target,
                sent,
                received,
                loss_percent,
                avg_latency_ms,
            } => write!(
                f,
                "{}: sent={} received={} loss={}% avg={:.2}ms",
                target, sent, received, loss_percent, avg_latency_ms
            ),
            PingSummary::NoReply => f.write_str("No reply"),
        }
    }
}
