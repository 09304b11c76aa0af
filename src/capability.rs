//! Host network stack capability
//!
//! Everything OS-specific sits behind [`NetworkCapability`]. The registry and
//! normalizer only ever see this trait, so they can be exercised against an
//! in-memory implementation.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::config::NetactionConfig;
use crate::error::{CapabilityError, CapabilityResult};
use crate::types::{
    AddressFamily, AddressRecord, Adapter, HopRecord, NeighborRecord, ProbeResult, RouteRecord,
};

/// Query and mutation primitives of the host network stack
///
/// Implementations report failures as [`CapabilityError`] and never retry.
#[async_trait]
pub trait NetworkCapability: Send + Sync {
    /// Name of this implementation (e.g. "iproute2")
    fn name(&self) -> &str;

    /// All adapters, ordered by OS index
    async fn list_adapters(&self) -> CapabilityResult<Vec<Adapter>>;

    /// Addresses of one family; empty when the OS reports none
    async fn list_addresses(&self, family: AddressFamily) -> CapabilityResult<Vec<AddressRecord>>;

    /// Routes of one family; empty when the OS reports none
    async fn list_routes(&self, family: AddressFamily) -> CapabilityResult<Vec<RouteRecord>>;

    /// Neighbor cache (ARP for IPv4, NDP for IPv6) of one family
    async fn list_neighbors(&self, family: AddressFamily) -> CapabilityResult<Vec<NeighborRecord>>;

    async fn add_address(
        &self,
        interface: &str,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    ) -> CapabilityResult<()>;

    async fn remove_address(
        &self,
        interface: &str,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    ) -> CapabilityResult<()>;

    /// Add a route. `interface` of `None` leaves the egress device to the OS.
    async fn add_route(
        &self,
        family: AddressFamily,
        destination: &str,
        next_hop: IpAddr,
        interface: Option<&str>,
    ) -> CapabilityResult<()>;

    async fn remove_route(
        &self,
        family: AddressFamily,
        destination: &str,
        next_hop: Option<IpAddr>,
        interface: Option<&str>,
    ) -> CapabilityResult<()>;

    async fn set_adapter_enabled(&self, interface: &str, enabled: bool) -> CapabilityResult<()>;

    /// Send `count` probes to `target`, one result per attempt
    async fn probe(&self, target: &str, count: u32) -> CapabilityResult<Vec<ProbeResult>>;

    /// Trace the path to `target`, probing at most `max_hops` hops
    async fn trace_route(&self, target: &str, max_hops: u32) -> CapabilityResult<Vec<HopRecord>>;
}

/// Select the capability implementation for the running OS
///
/// Hosts without an implementation get [`UnsupportedCapability`], so payload
/// and argument errors are still reported before the missing OS support.
pub fn host_capability(config: &NetactionConfig) -> Box<dyn NetworkCapability> {
    #[cfg(target_os = "linux")]
    {
        Box::new(crate::iproute::IpRouteCapability::new(config))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        Box::new(UnsupportedCapability::new(std::env::consts::OS))
    }
}

/// Capability for an OS with no implementation; every call fails with
/// [`CapabilityError::NotSupported`]
pub struct UnsupportedCapability {
    os: String,
}

impl UnsupportedCapability {
    pub fn new(os: impl Into<String>) -> Self {
        Self { os: os.into() }
    }

    fn refuse<T>(&self) -> CapabilityResult<T> {
        Err(CapabilityError::NotSupported(format!(
            "no network capability for {}",
            self.os
        )))
    }
}

#[async_trait]
impl NetworkCapability for UnsupportedCapability {
    fn name(&self) -> &str {
        "unsupported"
    }

    async fn list_adapters(&self) -> CapabilityResult<Vec<Adapter>> {
        self.refuse()
    }

    async fn list_addresses(&self, _family: AddressFamily) -> CapabilityResult<Vec<AddressRecord>> {
        self.refuse()
    }

    async fn list_routes(&self, _family: AddressFamily) -> CapabilityResult<Vec<RouteRecord>> {
        self.refuse()
    }

    async fn list_neighbors(&self, _family: AddressFamily) -> CapabilityResult<Vec<NeighborRecord>> {
        self.refuse()
    }

    async fn add_address(
        &self,
        _interface: &str,
        _family: AddressFamily,
        _address: IpAddr,
        _prefix_len: u8,
    ) -> CapabilityResult<()> {
        self.refuse()
    }

    async fn remove_address(
        &self,
        _interface: &str,
        _family: AddressFamily,
        _address: IpAddr,
        _prefix_len: u8,
    ) -> CapabilityResult<()> {
        self.refuse()
    }

    async fn add_route(
        &self,
        _family: AddressFamily,
        _destination: &str,
        _next_hop: IpAddr,
        _interface: Option<&str>,
    ) -> CapabilityResult<()> {
        self.refuse()
    }

    async fn remove_route(
        &self,
        _family: AddressFamily,
        _destination: &str,
        _next_hop: Option<IpAddr>,
        _interface: Option<&str>,
    ) -> CapabilityResult<()> {
        self.refuse()
    }

    async fn set_adapter_enabled(&self, _interface: &str, _enabled: bool) -> CapabilityResult<()> {
        self.refuse()
    }

    async fn probe(&self, _target: &str, _count: u32) -> CapabilityResult<Vec<ProbeResult>> {
        self.refuse()
    }

    async fn trace_route(&self, _target: &str, _max_hops: u32) -> CapabilityResult<Vec<HopRecord>> {
        self.refuse()
    }
}
