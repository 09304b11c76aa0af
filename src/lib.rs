//! netaction - Network Action Library
//!
//! Per-invocation action dispatch over the host network stack:
//! - Interface enumeration and admin state
//! - IP address assignment
//! - Routing table inspection and mutation
//! - Neighbor (ARP/NDP) cache inspection
//! - Reachability probes and path tracing
//!
//! The OS is reached only through [`NetworkCapability`]; results are shaped
//! by the pure functions in [`normalize`].

pub mod error;
pub mod types;
pub mod config;
pub mod validation;
pub mod capability;
pub mod normalize;
pub mod registry;
pub mod dispatch;
pub mod logging;

#[cfg(target_os = "linux")]
pub mod iproute;

// Re-export commonly used types
pub use error::{ActionError, CapabilityError, CapabilityResult, NetResult};
pub use types::{
    AddressFamily, AddressRecord, Adapter, AdminStatus, HopRecord, HopRow, InterfaceRow,
    NeighborRecord, NeighborRow, PingSummary, ProbeResult, RouteRecord, RouteRow,
};
pub use config::NetactionConfig;
pub use capability::{host_capability, NetworkCapability, UnsupportedCapability};
pub use registry::{Action, ActionSpec, Invocation, ACTIONS};
pub use dispatch::{ActionRequest, ActionResult, Dispatcher, Encoded};

#[cfg(target_os = "linux")]
pub use iproute::IpRouteCapability;
