//! In-memory network capability for dispatcher tests

#![allow(dead_code)]

use async_trait::async_trait;
use libnetaction::*;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// A capability call as seen by the fake
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListAdapters,
    ListAddresses(AddressFamily),
    ListRoutes(AddressFamily),
    ListNeighbors(AddressFamily),
    AddAddress(String, AddressFamily, IpAddr, u8),
    RemoveAddress(String, AddressFamily, IpAddr, u8),
    AddRoute(AddressFamily, String, IpAddr, Option<String>),
    RemoveRoute(AddressFamily, String, Option<IpAddr>, Option<String>),
    SetAdapterEnabled(String, bool),
    Probe(String, u32),
    TraceRoute(String, u32),
}

/// Canned host state plus a call log shared with the test
#[derive(Default)]
pub struct FakeCapability {
    pub adapters: Vec<Adapter>,
    pub addresses: Vec<AddressRecord>,
    pub routes: Vec<RouteRecord>,
    pub neighbors: Vec<NeighborRecord>,
    pub probes: Vec<ProbeResult>,
    pub hops: Vec<HopRecord>,
    /// When set, every mutation fails with this message as PermissionDenied
    pub deny: Option<String>,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
        self.calls.clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation(&self) -> CapabilityResult<()> {
        match &self.deny {
            Some(subject) => Err(CapabilityError::PermissionDenied(subject.clone())),
            None => Ok(()),
        }
    }
}

pub fn adapter(name: &str, index: u32, up: bool) -> Adapter {
    Adapter {
        name: name.to_string(),
        index: Some(index),
        admin_status: Some(AdminStatus::from(up)),
        enabled: None,
        oper_status: if up { "UP".to_string() } else { "DOWN".to_string() },
    }
}

pub fn address(name: &str, index: u32, ip: &str, prefix_len: u8) -> AddressRecord {
    AddressRecord {
        interface_name: name.to_string(),
        interface_index: Some(index),
        address: ip.parse().unwrap(),
        prefix_len,
    }
}

pub fn route(destination: &str, next_hop: Option<&str>, alias: &str, metric: u32) -> RouteRecord {
    RouteRecord {
        destination: destination.to_string(),
        next_hop: next_hop.map(str::to_string),
        interface_alias: alias.to_string(),
        metric,
    }
}

pub fn neighbor(ip: &str, lladdr: Option<&str>, dev: &str, state: &str) -> NeighborRecord {
    NeighborRecord {
        address: ip.parse().unwrap(),
        link_layer_address: lladdr.map(str::to_string),
        interface_alias: dev.to_string(),
        state: state.to_string(),
    }
}

#[async_trait]
impl NetworkCapability for FakeCapability {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_adapters(&self) -> CapabilityResult<Vec<Adapter>> {
        self.record(Call::ListAdapters);
        Ok(self.adapters.clone())
    }

    async fn list_addresses(&self, family: AddressFamily) -> CapabilityResult<Vec<AddressRecord>> {
        self.record(Call::ListAddresses(family));
        Ok(self
            .addresses
            .iter()
            .filter(|a| family.matches(&a.address))
            .cloned()
            .collect())
    }

    async fn list_routes(&self, family: AddressFamily) -> CapabilityResult<Vec<RouteRecord>> {
        self.record(Call::ListRoutes(family));
        Ok(self.routes.clone())
    }

    async fn list_neighbors(&self, family: AddressFamily) -> CapabilityResult<Vec<NeighborRecord>> {
        self.record(Call::ListNeighbors(family));
        Ok(self
            .neighbors
            .iter()
            .filter(|n| family.matches(&n.address))
            .cloned()
            .collect())
    }

    async fn add_address(
        &self,
        interface: &str,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    ) -> CapabilityResult<()> {
        self.record(Call::AddAddress(interface.to_string(), family, address, prefix_len));
        self.mutation()
    }

    async fn remove_address(
        &self,
        interface: &str,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    ) -> CapabilityResult<()> {
        self.record(Call::RemoveAddress(interface.to_string(), family, address, prefix_len));
        self.mutation()
    }

    async fn add_route(
        &self,
        family: AddressFamily,
        destination: &str,
        next_hop: IpAddr,
        interface: Option<&str>,
    ) -> CapabilityResult<()> {
        self.record(Call::AddRoute(
            family,
            destination.to_string(),
            next_hop,
            interface.map(str::to_string),
        ));
        self.mutation()
    }

    async fn remove_route(
        &self,
        family: AddressFamily,
        destination: &str,
        next_hop: Option<IpAddr>,
        interface: Option<&str>,
    ) -> CapabilityResult<()> {
        self.record(Call::RemoveRoute(
            family,
            destination.to_string(),
            next_hop,
            interface.map(str::to_string),
        ));
        self.mutation()
    }

    async fn set_adapter_enabled(&self, interface: &str, enabled: bool) -> CapabilityResult<()> {
        self.record(Call::SetAdapterEnabled(interface.to_string(), enabled));
        self.mutation()
    }

    async fn probe(&self, target: &str, count: u32) -> CapabilityResult<Vec<ProbeResult>> {
        self.record(Call::Probe(target.to_string(), count));
        Ok(self.probes.clone())
    }

    async fn trace_route(&self, target: &str, max_hops: u32) -> CapabilityResult<Vec<HopRecord>> {
        self.record(Call::TraceRoute(target.to_string(), max_hops));
        Ok(self.hops.clone())
    }
}
