//! Action registry
//!
//! The closed set of supported actions, their argument schemas, and the
//! handlers that run them against a [`NetworkCapability`].

use serde_json::{json, Map, Value};
use std::net::IpAddr;
use tracing::{debug, info};

use crate::capability::NetworkCapability;
use crate::config::NetactionConfig;
use crate::error::{ActionError, NetResult};
use crate::normalize;
use crate::types::AddressFamily;
use crate::validation;

/// Literal result of a successful mutation
pub const OK: &str = "OK";

/// Supported actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetInterfaces,
    SetIp,
    RemoveIp,
    EnableInterface,
    DisableInterface,
    GetRoutes,
    AddRoute,
    RemoveRoute,
    GetNeighbors,
    Ping,
    Traceroute,
}

/// Registry entry: wire name and argument schema of an action
#[derive(Debug)]
pub struct ActionSpec {
    pub action: Action,
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub description: &'static str,
}

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        action: Action::GetInterfaces,
        name: "GetInterfaces",
        required: &["Version"],
        optional: &[],
        description: "List interfaces with their addresses of one family",
    },
    ActionSpec {
        action: Action::SetIp,
        name: "SetIP",
        required: &["Name", "Version", "Prefix"],
        optional: &[],
        description: "Assign an address/prefix to an interface",
    },
    ActionSpec {
        action: Action::RemoveIp,
        name: "RemoveIP",
        required: &["Name", "Version", "Prefix"],
        optional: &[],
        description: "Remove an address/prefix from an interface",
    },
    ActionSpec {
        action: Action::EnableInterface,
        name: "EnableInterface",
        required: &["Name"],
        optional: &[],
        description: "Administratively enable an interface",
    },
    ActionSpec {
        action: Action::DisableInterface,
        name: "DisableInterface",
        required: &["Name"],
        optional: &[],
        description: "Administratively disable an interface",
    },
    ActionSpec {
        action: Action::GetRoutes,
        name: "GetRoutes",
        required: &["Version"],
        optional: &[],
        description: "List routes of one family ordered by metric",
    },
    ActionSpec {
        action: Action::AddRoute,
        name: "AddRoute",
        required: &["Version", "Destination", "NextHop"],
        optional: &["InterfaceAlias"],
        description: "Add a route via a next hop",
    },
    ActionSpec {
        action: Action::RemoveRoute,
        name: "RemoveRoute",
        required: &["Version", "Destination"],
        optional: &["NextHop", "InterfaceAlias"],
        description: "Remove a route",
    },
    ActionSpec {
        action: Action::GetNeighbors,
        name: "GetNeighbors",
        required: &["Version"],
        optional: &[],
        description: "List the ARP (IPv4) or NDP (IPv6) neighbor cache",
    },
    ActionSpec {
        action: Action::Ping,
        name: "Ping",
        required: &["Target", "Count"],
        optional: &[],
        description: "Probe a host and summarize loss and latency",
    },
    ActionSpec {
        action: Action::Traceroute,
        name: "Traceroute",
        required: &["Target"],
        optional: &["MaxHops"],
        description: "Trace the path to a host hop by hop",
    },
];

impl Action {
    /// Look up an action by its exact wire name
    pub fn from_name(name: &str) -> Option<Action> {
        ACTIONS.iter().find(|spec| spec.name == name).map(|spec| spec.action)
    }

    pub fn spec(&self) -> &'static ActionSpec {
        // ACTIONS lists every variant
        ACTIONS
            .iter()
            .find(|spec| spec.action == *self)
            .unwrap_or(&ACTIONS[0])
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }
}

/// Read access to an argument payload
struct Args<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Fail on the first required key that is absent or null
    fn check_required(&self, spec: &ActionSpec) -> NetResult<()> {
        for key in spec.required {
            if matches!(self.map.get(*key), None | Some(Value::Null)) {
                return Err(ActionError::MissingArgument(key.to_string()));
            }
        }
        for key in self.map.keys() {
            if !spec.required.contains(&key.as_str()) && !spec.optional.contains(&key.as_str()) {
                debug!("Ignoring unexpected argument '{}' for {}", key, spec.name);
            }
        }
        Ok(())
    }

    fn string(&self, key: &str) -> NetResult<&'a str> {
        match self.map.get(key) {
            None | Some(Value::Null) => Err(ActionError::MissingArgument(key.to_string())),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(ActionError::invalid(key, format!("expected a string, got {}", other))),
        }
    }

    /// Absent, null and empty string all mean "unset"
    fn optional_string(&self, key: &str) -> NetResult<Option<&'a str>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ActionError::invalid(key, format!("expected a string, got {}", other))),
        }
    }

    fn family(&self) -> NetResult<AddressFamily> {
        let raw = self.string("Version")?;
        raw.parse::<AddressFamily>()
            .map_err(|reason| ActionError::invalid("Version", reason))
    }

    fn target(&self) -> NetResult<String> {
        let target = self.string("Target")?;
        validation::validate_hostname("Target", target)?;
        Ok(target.to_string())
    }

    fn interface(&self, key: &str) -> NetResult<&'a str> {
        let name = self.string(key)?;
        validation::validate_interface_name(key, name)?;
        Ok(name)
    }

    fn positive_count(&self, key: &str, max: u32) -> NetResult<u32> {
        self.optional_count(key, max)?
            .ok_or_else(|| ActionError::MissingArgument(key.to_string()))
    }

    /// Integer in `1..=max`; absent or null means unset
    fn optional_count(&self, key: &str, max: u32) -> NetResult<Option<u32>> {
        let value = match self.map.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value,
        };
        let count = value
            .as_u64()
            .ok_or_else(|| ActionError::invalid(key, format!("expected a positive integer, got {}", value)))?;
        if count == 0 {
            return Err(ActionError::invalid(key, "must be at least 1"));
        }
        if count > u64::from(max) {
            return Err(ActionError::invalid(key, format!("must not exceed {}", max)));
        }
        Ok(Some(count as u32))
    }
}

/// A validated, typed action invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    GetInterfaces {
        family: AddressFamily,
    },
    SetIp {
        name: String,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    },
    RemoveIp {
        name: String,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    },
    SetEnabled {
        name: String,
        enabled: bool,
    },
    GetRoutes {
        family: AddressFamily,
    },
    AddRoute {
        family: AddressFamily,
        destination: String,
        next_hop: IpAddr,
        interface: Option<String>,
    },
    RemoveRoute {
        family: AddressFamily,
        destination: String,
        next_hop: Option<IpAddr>,
        interface: Option<String>,
    },
    GetNeighbors {
        family: AddressFamily,
    },
    Ping {
        target: String,
        count: u32,
    },
    Traceroute {
        target: String,
        max_hops: u32,
    },
}

impl Invocation {
    /// Validate a raw argument map against the schema of `action`
    pub fn decode(
        action: Action,
        map: &Map<String, Value>,
        config: &NetactionConfig,
    ) -> NetResult<Self> {
        let args = Args::new(map);
        args.check_required(action.spec())?;

        let invocation = match action {
            Action::GetInterfaces => Invocation::GetInterfaces {
                family: args.family()?,
            },
            Action::SetIp | Action::RemoveIp => {
                let name = args.interface("Name")?.to_string();
                let family = args.family()?;
                let (address, prefix_len) =
                    validation::parse_prefix("Prefix", args.string("Prefix")?, family)?;
                if action == Action::SetIp {
                    Invocation::SetIp { name, family, address, prefix_len }
                } else {
                    Invocation::RemoveIp { name, family, address, prefix_len }
                }
            }
            Action::EnableInterface | Action::DisableInterface => Invocation::SetEnabled {
                name: args.interface("Name")?.to_string(),
                enabled: action == Action::EnableInterface,
            },
            Action::GetRoutes => Invocation::GetRoutes {
                family: args.family()?,
            },
            Action::AddRoute => {
                let family = args.family()?;
                Invocation::AddRoute {
                    family,
                    destination: validation::parse_destination(
                        "Destination",
                        args.string("Destination")?,
                        family,
                    )?,
                    next_hop: validation::validate_ip_address("NextHop", args.string("NextHop")?, family)?,
                    interface: optional_interface(&args)?,
                }
            }
            Action::RemoveRoute => {
                let family = args.family()?;
                let next_hop = match args.optional_string("NextHop")? {
                    Some(hop) => Some(validation::validate_ip_address("NextHop", hop, family)?),
                    None => None,
                };
                Invocation::RemoveRoute {
                    family,
                    destination: validation::parse_destination(
                        "Destination",
                        args.string("Destination")?,
                        family,
                    )?,
                    next_hop,
                    interface: optional_interface(&args)?,
                }
            }
            Action::GetNeighbors => Invocation::GetNeighbors {
                family: args.family()?,
            },
            Action::Ping => Invocation::Ping {
                target: args.target()?,
                count: args.positive_count("Count", config.ping.max_count)?,
            },
            Action::Traceroute => {
                let limit = config.traceroute.max_hops;
                Invocation::Traceroute {
                    target: args.target()?,
                    max_hops: args.optional_count("MaxHops", limit)?.unwrap_or(limit),
                }
            }
        };

        Ok(invocation)
    }

    /// Run against the host network stack and shape the result
    pub async fn run(self, capability: &dyn NetworkCapability) -> NetResult<Value> {
        match self {
            Invocation::GetInterfaces { family } => {
                let adapters = capability.list_adapters().await?;
                let addresses = capability.list_addresses(family).await?;
                let rows = normalize::build_interface_rows(&adapters, &addresses, family)?;
                Ok(json!(rows))
            }
            Invocation::SetIp { name, family, address, prefix_len } => {
                capability.add_address(&name, family, address, prefix_len).await?;
                info!("Assigned {}/{} to {}", address, prefix_len, name);
                Ok(json!(OK))
            }
            Invocation::RemoveIp { name, family, address, prefix_len } => {
                capability.remove_address(&name, family, address, prefix_len).await?;
                info!("Removed {}/{} from {}", address, prefix_len, name);
                Ok(json!(OK))
            }
            Invocation::SetEnabled { name, enabled } => {
                capability.set_adapter_enabled(&name, enabled).await?;
                let state = if enabled { "up" } else { "down" };
                info!("Interface {} set {}", name, state);
                Ok(json!(state))
            }
            Invocation::GetRoutes { family } => {
                let routes = capability.list_routes(family).await?;
                Ok(json!(normalize::build_route_rows(routes)))
            }
            Invocation::AddRoute { family, destination, next_hop, interface } => {
                capability
                    .add_route(family, &destination, next_hop, interface.as_deref())
                    .await?;
                info!("Added route {} via {}", destination, next_hop);
                Ok(json!(OK))
            }
            Invocation::RemoveRoute { family, destination, next_hop, interface } => {
                capability
                    .remove_route(family, &destination, next_hop, interface.as_deref())
                    .await?;
                info!("Removed route {}", destination);
                Ok(json!(OK))
            }
            Invocation::GetNeighbors { family } => {
                let neighbors = capability.list_neighbors(family).await?;
                Ok(json!(normalize::build_neighbor_rows(neighbors)))
            }
            Invocation::Ping { target, count } => {
                let probes = capability.probe(&target, count).await?;
                let summary = normalize::build_ping_summary(&target, count, &probes);
                Ok(Value::String(summary.to_string()))
            }
            Invocation::Traceroute { target, max_hops } => {
                let hops = capability.trace_route(&target, max_hops).await?;
                Ok(json!(normalize::build_hop_rows(hops)))
            }
        }
    }
}

fn optional_interface(args: &Args<'_>) -> NetResult<Option<String>> {
    match args.optional_string("InterfaceAlias")? {
        Some(alias) => {
            validation::validate_interface_name("InterfaceAlias", alias)?;
            Ok(Some(alias.to_string()))
        }
        None => Ok(None),
    }
}
