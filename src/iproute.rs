//! Linux network capability
//!
//! Drives iproute2 (`ip -json ...`), iputils `ping` and `traceroute`. Commands
//! are spawned with explicit argument vectors, never through a shell.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::capability::NetworkCapability;
use crate::config::NetactionConfig;
use crate::error::{CapabilityError, CapabilityResult};
use crate::types::{
    AddressFamily, AddressRecord, Adapter, AdminStatus, HopRecord, NeighborRecord, ProbeResult,
    RouteRecord,
};

/// Which kind of object a mutating command touched, for error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Address,
    Route,
    Link,
}

/// What a mutating `ip` command was applied to, for error messages
struct Subject<'a> {
    /// The object itself, e.g. `10.0.0.5/24 on eth0`
    object: &'a str,
    /// Device named on the command line, if any
    interface: Option<&'a str>,
}

/// `NetworkCapability` backed by iproute2, ping and traceroute
pub struct IpRouteCapability {
    ip_bin: PathBuf,
    ping_bin: PathBuf,
    traceroute_bin: PathBuf,
    ping_timeout_secs: u32,
    trace_wait_secs: u32,
    trace_queries: u32,
}

impl IpRouteCapability {
    pub fn new(config: &NetactionConfig) -> Self {
        Self {
            ip_bin: config.tools.ip.clone(),
            ping_bin: config.tools.ping.clone(),
            traceroute_bin: config.tools.traceroute.clone(),
            ping_timeout_secs: config.ping.timeout_secs,
            trace_wait_secs: config.traceroute.wait_secs,
            trace_queries: config.traceroute.queries,
        }
    }

    // === Helper functions ===

    async fn output(&self, bin: &Path, args: &[String]) -> CapabilityResult<std::process::Output> {
        let cmd_str = format!("{} {}", bin.display(), args.join(" "));
        debug!("Running {}", cmd_str);

        Command::new(bin)
            .args(args)
            .output()
            .await
            .map_err(|e| CapabilityError::CommandFailed {
                cmd: cmd_str,
                code: None,
                stderr: e.to_string(),
            })
    }

    /// Run `ip` and return its stdout
    async fn query_ip(&self, args: &[String]) -> CapabilityResult<String> {
        let output = self.output(&self.ip_bin, args).await?;

        if !output.status.success() {
            return Err(CapabilityError::CommandFailed {
                cmd: format!("ip {}", args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|e| CapabilityError::Parse(format!("Invalid UTF-8 in ip output: {}", e)))
    }

    /// Run a mutating `ip` command
    async fn change_ip(&self, args: Vec<String>, target: Target, subject: Subject<'_>) -> CapabilityResult<()> {
        let output = self.output(&self.ip_bin, &args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(classify_failure(
                target,
                &subject,
                format!("ip {}", args.join(" ")),
                output.status.code(),
                stderr,
            ));
        }

        info!("Applied: ip {}", args.join(" "));
        Ok(())
    }
}

fn family_flag(family: AddressFamily) -> String {
    match family {
        AddressFamily::IPv4 => "-4".to_string(),
        AddressFamily::IPv6 => "-6".to_string(),
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl NetworkCapability for IpRouteCapability {
    fn name(&self) -> &str {
        "iproute2"
    }

    async fn list_adapters(&self) -> CapabilityResult<Vec<Adapter>> {
        let json = self.query_ip(&strings(&["-json", "link", "show"])).await?;
        parse_links(&json)
    }

    async fn list_addresses(&self, family: AddressFamily) -> CapabilityResult<Vec<AddressRecord>> {
        let args = vec![family_flag(family), "-json".into(), "addr".into(), "show".into()];
        let json = self.query_ip(&args).await?;
        parse_addresses(&json, family)
    }

    async fn list_routes(&self, family: AddressFamily) -> CapabilityResult<Vec<RouteRecord>> {
        let args = vec![family_flag(family), "-json".into(), "route".into(), "show".into()];
        let json = self.query_ip(&args).await?;
        parse_routes(&json, family)
    }

    async fn list_neighbors(&self, family: AddressFamily) -> CapabilityResult<Vec<NeighborRecord>> {
        let args = vec![family_flag(family), "-json".into(), "neigh".into(), "show".into()];
        let json = self.query_ip(&args).await?;
        parse_neighbors(&json, family)
    }

    async fn add_address(
        &self,
        interface: &str,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    ) -> CapabilityResult<()> {
        let addr = format!("{}/{}", address, prefix_len);
        let args = vec![
            family_flag(family),
            "addr".into(),
            "add".into(),
            addr.clone(),
            "dev".into(),
            interface.to_string(),
        ];
        let object = format!("{} on {}", addr, interface);
        let subject = Subject { object: &object, interface: Some(interface) };
        self.change_ip(args, Target::Address, subject).await
    }

    async fn remove_address(
        &self,
        interface: &str,
        family: AddressFamily,
        address: IpAddr,
        prefix_len: u8,
    ) -> CapabilityResult<()> {
        let addr = format!("{}/{}", address, prefix_len);
        let args = vec![
            family_flag(family),
            "addr".into(),
            "del".into(),
            addr.clone(),
            "dev".into(),
            interface.to_string(),
        ];
        let object = format!("{} on {}", addr, interface);
        let subject = Subject { object: &object, interface: Some(interface) };
        self.change_ip(args, Target::Address, subject).await
    }

    async fn add_route(
        &self,
        family: AddressFamily,
        destination: &str,
        next_hop: IpAddr,
        interface: Option<&str>,
    ) -> CapabilityResult<()> {
        let mut args = vec![
            family_flag(family),
            "route".into(),
            "add".into(),
            destination.to_string(),
            "via".into(),
            next_hop.to_string(),
        ];
        if let Some(iface) = interface {
            args.extend(["dev".to_string(), iface.to_string()]);
        }
        let subject = Subject { object: destination, interface };
        self.change_ip(args, Target::Route, subject).await
    }

    async fn remove_route(
        &self,
        family: AddressFamily,
        destination: &str,
        next_hop: Option<IpAddr>,
        interface: Option<&str>,
    ) -> CapabilityResult<()> {
        let mut args = vec![
            family_flag(family),
            "route".into(),
            "del".into(),
            destination.to_string(),
        ];
        if let Some(hop) = next_hop {
            args.extend(["via".to_string(), hop.to_string()]);
        }
        if let Some(iface) = interface {
            args.extend(["dev".to_string(), iface.to_string()]);
        }
        let subject = Subject { object: destination, interface };
        self.change_ip(args, Target::Route, subject).await
    }

    async fn set_adapter_enabled(&self, interface: &str, enabled: bool) -> CapabilityResult<()> {
        let state = if enabled { "up" } else { "down" };
        let args = strings(&["link", "set", "dev", interface, state]);
        let subject = Subject { object: interface, interface: Some(interface) };
        self.change_ip(args, Target::Link, subject).await
    }

    async fn probe(&self, target: &str, count: u32) -> CapabilityResult<Vec<ProbeResult>> {
        let mut args = vec![
            "-n".to_string(),
            "-c".to_string(),
            count.to_string(),
            "-W".to_string(),
            self.ping_timeout_secs.to_string(),
        ];
        if matches!(target.parse::<IpAddr>(), Ok(IpAddr::V6(_))) {
            args.push("-6".to_string());
        }
        args.push(target.to_string());

        let output = self.output(&self.ping_bin, &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // ping exits 1 when replies are missing; only 2+ means it could not run
        if !output.status.success() && output.status.code() != Some(1) {
            return Err(CapabilityError::CommandFailed {
                cmd: format!("{} {}", self.ping_bin.display(), args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(parse_ping_output(&stdout, count))
    }

    async fn trace_route(&self, target: &str, max_hops: u32) -> CapabilityResult<Vec<HopRecord>> {
        let mut args = vec![
            "-n".to_string(),
            "-q".to_string(),
            self.trace_queries.to_string(),
            "-w".to_string(),
            self.trace_wait_secs.to_string(),
            "-m".to_string(),
            max_hops.to_string(),
        ];
        if matches!(target.parse::<IpAddr>(), Ok(IpAddr::V6(_))) {
            args.push("-6".to_string());
        }
        args.push(target.to_string());

        let output = self.output(&self.traceroute_bin, &args).await?;

        if !output.status.success() {
            return Err(CapabilityError::CommandFailed {
                cmd: format!("{} {}", self.traceroute_bin.display(), args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(parse_traceroute_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Map `ip` stderr onto a capability error kind
fn classify_failure(
    target: Target,
    subject: &Subject<'_>,
    cmd: String,
    code: Option<i32>,
    stderr: String,
) -> CapabilityError {
    let lower = stderr.to_lowercase();
    let object = subject.object;

    if lower.contains("operation not permitted") || lower.contains("permission denied") {
        return CapabilityError::PermissionDenied(object.to_string());
    }
    if lower.contains("cannot find device") || lower.contains("no such device") {
        let name = subject.interface.unwrap_or(object);
        return CapabilityError::InterfaceNotFound(name.to_string());
    }
    if lower.contains("file exists") {
        return match target {
            Target::Route => CapabilityError::RouteConflict(object.to_string()),
            _ => CapabilityError::AddressConflict(object.to_string()),
        };
    }
    if lower.contains("invalid prefix") || lower.contains("invalid argument") || lower.contains("is not a valid") {
        return match target {
            Target::Route => CapabilityError::InvalidDestination(object.to_string()),
            _ => CapabilityError::InvalidPrefix(object.to_string()),
        };
    }

    CapabilityError::CommandFailed { cmd, code, stderr }
}

// === Parsers for `ip -json` output ===

#[derive(Debug, Deserialize)]
struct LinkJson {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    operstate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddrIfaceJson {
    ifindex: Option<u32>,
    ifname: String,
    #[serde(default)]
    addr_info: Vec<AddrInfoJson>,
}

#[derive(Debug, Deserialize)]
struct AddrInfoJson {
    local: Option<String>,
    prefixlen: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RouteJson {
    dst: String,
    #[serde(default)]
    gateway: Option<String>,
    #[serde(default)]
    dev: Option<String>,
    #[serde(default)]
    metric: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NeighJson {
    dst: String,
    #[serde(default)]
    dev: Option<String>,
    #[serde(default)]
    lladdr: Option<String>,
    #[serde(default)]
    state: Vec<String>,
}

/// Parse `ip -json link show`
pub(crate) fn parse_links(json: &str) -> CapabilityResult<Vec<Adapter>> {
    let links: Vec<LinkJson> = serde_json::from_str(json)?;

    let mut adapters: Vec<Adapter> = links
        .into_iter()
        .map(|link| Adapter {
            admin_status: Some(AdminStatus::from(link.flags.iter().any(|f| f == "UP"))),
            enabled: None,
            oper_status: link.operstate.unwrap_or_else(|| "UNKNOWN".to_string()),
            index: Some(link.ifindex),
            name: link.ifname,
        })
        .collect();

    adapters.sort_by_key(|a| a.index);
    Ok(adapters)
}

/// Parse `ip -json -4|-6 addr show`
pub(crate) fn parse_addresses(json: &str, family: AddressFamily) -> CapabilityResult<Vec<AddressRecord>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let ifaces: Vec<AddrIfaceJson> = serde_json::from_str(json)?;

    let mut records = Vec::new();
    for iface in ifaces {
        for info in iface.addr_info {
            let (Some(local), Some(prefix_len)) = (info.local, info.prefixlen) else {
                continue;
            };
            let address: IpAddr = local
                .parse()
                .map_err(|_| CapabilityError::Parse(format!("Invalid address in ip output: {}", local)))?;
            if !family.matches(&address) {
                continue;
            }
            records.push(AddressRecord {
                interface_name: iface.ifname.clone(),
                interface_index: iface.ifindex,
                address,
                prefix_len,
            });
        }
    }

    Ok(records)
}

/// Parse `ip -json -4|-6 route show`
pub(crate) fn parse_routes(json: &str, family: AddressFamily) -> CapabilityResult<Vec<RouteRecord>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let routes: Vec<RouteJson> = serde_json::from_str(json)?;

    Ok(routes
        .into_iter()
        .map(|route| RouteRecord {
            destination: canonical_destination(&route.dst, family),
            next_hop: route.gateway,
            interface_alias: route.dev.unwrap_or_default(),
            metric: route.metric.unwrap_or(0),
        })
        .collect())
}

/// Parse `ip -json -4|-6 neigh show`
pub(crate) fn parse_neighbors(json: &str, family: AddressFamily) -> CapabilityResult<Vec<NeighborRecord>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<NeighJson> = serde_json::from_str(json)?;

    let mut records = Vec::new();
    for entry in entries {
        let address: IpAddr = entry
            .dst
            .parse()
            .map_err(|_| CapabilityError::Parse(format!("Invalid neighbor address in ip output: {}", entry.dst)))?;
        if !family.matches(&address) {
            continue;
        }
        records.push(NeighborRecord {
            address,
            link_layer_address: entry.lladdr,
            interface_alias: entry.dev.unwrap_or_default(),
            state: if entry.state.is_empty() {
                "NONE".to_string()
            } else {
                entry.state.join(",")
            },
        });
    }

    Ok(records)
}

fn canonical_destination(dst: &str, family: AddressFamily) -> String {
    if dst == "default" {
        return match family {
            AddressFamily::IPv4 => "0.0.0.0/0".to_string(),
            AddressFamily::IPv6 => "::/0".to_string(),
        };
    }
    if dst.contains('/') {
        dst.to_string()
    } else {
        format!("{}/{}", dst, family.max_prefix_len())
    }
}

/// Turn ping output into one result per attempt
///
/// Replies are keyed by sequence number; sequence numbers that never
/// replied are timeouts. Duplicate replies are ignored.
pub(crate) fn parse_ping_output(stdout: &str, count: u32) -> Vec<ProbeResult> {
    let mut replies: BTreeMap<u32, f64> = BTreeMap::new();

    for line in stdout.lines() {
        if line.contains("DUP!") {
            continue;
        }
        let (Some(seq), Some(time)) = (field_after(line, "seq="), field_after(line, "time=")) else {
            continue;
        };
        let (Ok(seq), Ok(time)) = (seq.parse::<u32>(), time.parse::<f64>()) else {
            continue;
        };
        replies.entry(seq).or_insert(time);
    }

    // iputils numbers from 1, busybox from 0
    let first: u32 = if replies.contains_key(&0) { 0 } else { 1 };

    (first..first.saturating_add(count))
        .map(|seq| match replies.get(&seq) {
            Some(ms) => ProbeResult::Reply(*ms),
            None => ProbeResult::Timeout,
        })
        .collect()
}

/// Turn `traceroute -n` output into one record per hop
///
/// A hop line is the hop number followed by addresses, `<time> ms` pairs and
/// `*` for unanswered probes. The first address on the line is the hop's
/// address; `!H`-style annotations are skipped.
pub(crate) fn parse_traceroute_output(stdout: &str) -> Vec<HopRecord> {
    let mut hops = Vec::new();

    for line in stdout.lines() {
        let mut tokens = line.split_whitespace().peekable();
        let Some(hop) = tokens.next().and_then(|t| t.parse::<u32>().ok()) else {
            continue;
        };

        let mut address = None;
        let mut probes = Vec::new();
        while let Some(token) = tokens.next() {
            if token == "*" {
                probes.push(ProbeResult::Timeout);
            } else if let Ok(ip) = token.parse::<IpAddr>() {
                if address.is_none() {
                    address = Some(ip);
                }
            } else if let Ok(ms) = token.parse::<f64>() {
                if tokens.peek() == Some(&"ms") {
                    tokens.next();
                    probes.push(ProbeResult::Reply(ms));
                }
            }
        }

        hops.push(HopRecord { hop, address, probes });
    }

    hops
}

fn field_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}
