//! State normalization
//!
//! Pure transforms from raw capability records into the canonical result
//! rows. No I/O happens here.

use tracing::warn;

use crate::error::{ActionError, NetResult};
use crate::types::{
    AddressFamily, AddressRecord, Adapter, AdminStatus, HopRecord, HopRow, InterfaceRow,
    NeighborRecord, NeighborRow, PingSummary, ProbeResult, RouteRecord, RouteRow,
};

/// Next hop rendered when a route has none
pub const NO_NEXT_HOP: &str = "-";

/// Link-layer address rendered for unresolved neighbors
pub const NO_LINK_LAYER_ADDRESS: &str = "-";

/// Address rendered for a hop that never answered
pub const SILENT_HOP: &str = "*";

/// Join adapters with the addresses of one family
///
/// One row per adapter, in adapter order. An address belongs to an adapter
/// when both carry an index and the indices agree, otherwise when the names
/// are equal (case-sensitive). The field of the inactive family is always
/// empty. IPv4 addresses are rendered bare, IPv6 as `address/prefixLength`.
pub fn build_interface_rows(
    adapters: &[Adapter],
    addresses: &[AddressRecord],
    family: AddressFamily,
) -> NetResult<Vec<InterfaceRow>> {
    let mut rows = Vec::with_capacity(adapters.len());
    let mut claimed = vec![false; addresses.len()];

    for adapter in adapters {
        let admin_status = admin_status(adapter)?;
        let mut ipv4 = Vec::new();
        let mut ipv6 = Vec::new();

        for (i, record) in addresses.iter().enumerate() {
            if claimed[i] || !belongs_to(record, adapter) {
                continue;
            }
            if !family.matches(&record.address) {
                warn!(
                    "Ignoring {} address {} on {} in {} query",
                    AddressFamily::of(&record.address),
                    record.address,
                    record.interface_name,
                    family
                );
                claimed[i] = true;
                continue;
            }
            claimed[i] = true;
            match family {
                AddressFamily::IPv4 => ipv4.push(record.address.to_string()),
                AddressFamily::IPv6 => {
                    ipv6.push(format!("{}/{}", record.address, record.prefix_len))
                }
            }
        }

        rows.push(InterfaceRow {
            name: adapter.name.clone(),
            admin_status,
            oper_status: adapter.oper_status.clone(),
            ipv4,
            ipv6,
        });
    }

    for (record, _) in addresses.iter().zip(&claimed).filter(|(_, c)| !**c) {
        warn!(
            "Address {} references unknown interface {}",
            record.address, record.interface_name
        );
    }

    Ok(rows)
}

fn belongs_to(record: &AddressRecord, adapter: &Adapter) -> bool {
    match (record.interface_index, adapter.index) {
        (Some(a), Some(b)) => a == b,
        _ => record.interface_name == adapter.name,
    }
}

fn admin_status(adapter: &Adapter) -> NetResult<AdminStatus> {
    match (adapter.admin_status, adapter.enabled) {
        (Some(status), _) => Ok(status),
        (None, Some(enabled)) => Ok(AdminStatus::from(enabled)),
        (None, None) => Err(ActionError::AdapterStatusUnavailable(adapter.name.clone())),
    }
}

/// Order routes by metric, then destination, and fill in absent next hops
pub fn build_route_rows(routes: Vec<RouteRecord>) -> Vec<RouteRow> {
    let mut rows: Vec<RouteRow> = routes
        .into_iter()
        .map(|route| RouteRow {
            destination: route.destination,
            next_hop: route
                .next_hop
                .filter(|hop| !hop.is_empty())
                .unwrap_or_else(|| NO_NEXT_HOP.to_string()),
            interface_alias: route.interface_alias,
            route_metric: route.metric,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.route_metric
            .cmp(&b.route_metric)
            .then_with(|| a.destination.cmp(&b.destination))
    });
    rows
}

/// Summarize a batch of probes
///
/// Loss is `(expected - received) * 100 / expected` in integer arithmetic,
/// i.e. the percentage truncated toward zero. Average latency is the mean
/// of the replies rounded to two decimals, halves away from zero.
pub fn build_ping_summary(target: &str, expected_count: u32, probes: &[ProbeResult]) -> PingSummary {
    let sent = expected_count.max(1);
    // Results past the requested count are ignored
    let replies = reply_times(probes.iter().take(sent as usize));

    let Some(avg_latency_ms) = mean_2dp(&replies) else {
        return PingSummary::NoReply;
    };

    let received = replies.len() as u32;
    let loss_percent = (u64::from(sent - received) * 100 / u64::from(sent)) as u32;

    PingSummary::Replied {
        target: target.to_string(),
        sent,
        received,
        loss_percent,
        avg_latency_ms,
    }
}

/// Order neighbor entries by interface, then address
pub fn build_neighbor_rows(mut neighbors: Vec<NeighborRecord>) -> Vec<NeighborRow> {
    neighbors.sort_by(|a, b| {
        a.interface_alias
            .cmp(&b.interface_alias)
            .then_with(|| a.address.cmp(&b.address))
    });

    neighbors
        .into_iter()
        .map(|entry| NeighborRow {
            ip_address: entry.address.to_string(),
            link_layer_address: entry
                .link_layer_address
                .filter(|lladdr| !lladdr.is_empty())
                .unwrap_or_else(|| NO_LINK_LAYER_ADDRESS.to_string()),
            state: entry.state,
            interface_alias: entry.interface_alias,
        })
        .collect()
}

/// One row per hop in hop order, averaging the answered probes of each
pub fn build_hop_rows(mut hops: Vec<HopRecord>) -> Vec<HopRow> {
    hops.sort_by_key(|hop| hop.hop);

    hops.into_iter()
        .map(|hop| HopRow {
            hop: hop.hop,
            address: hop
                .address
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| SILENT_HOP.to_string()),
            avg_latency_ms: mean_2dp(&reply_times(hop.probes.iter())),
        })
        .collect()
}

fn reply_times<'a>(probes: impl Iterator<Item = &'a ProbeResult>) -> Vec<f64> {
    probes
        .filter_map(|probe| match probe {
            ProbeResult::Reply(ms) => Some(*ms),
            ProbeResult::Timeout => None,
        })
        .collect()
}

fn mean_2dp(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(round_2dp(mean))
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(name: &str, index: u32, up: bool) -> Adapter {
        Adapter {
            name: name.to_string(),
            index: Some(index),
            admin_status: Some(AdminStatus::from(up)),
            enabled: None,
            oper_status: if up { "UP".into() } else { "DOWN".into() },
        }
    }

    fn addr(name: &str, index: Option<u32>, ip: &str, prefix: u8) -> AddressRecord {
        AddressRecord {
            interface_name: name.to_string(),
            interface_index: index,
            address: ip.parse().unwrap(),
            prefix_len: prefix,
        }
    }

    fn route(dest: &str, hop: Option<&str>, alias: &str, metric: u32) -> RouteRecord {
        RouteRecord {
            destination: dest.to_string(),
            next_hop: hop.map(str::to_string),
            interface_alias: alias.to_string(),
            metric,
        }
    }

    #[test]
    fn test_adapter_without_addresses_keeps_empty_row() {
        let adapters = vec![adapter("lo", 1, true), adapter("eth1", 3, false)];
        let addresses = vec![addr("lo", Some(1), "127.0.0.1", 8)];

        let rows = build_interface_rows(&adapters, &addresses, AddressFamily::IPv4).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ipv4, vec!["127.0.0.1"]);
        assert!(rows[0].ipv6.is_empty());
        assert_eq!(rows[1].name, "eth1");
        assert!(rows[1].ipv4.is_empty());
        assert!(rows[1].ipv6.is_empty());
        assert_eq!(rows[1].admin_status, AdminStatus::Down);
    }

    #[test]
    fn test_ipv4_rendered_without_prefix() {
        let adapters = vec![adapter("eth0", 2, true)];
        let addresses = vec![
            addr("eth0", Some(2), "10.0.0.5", 24),
            addr("eth0", Some(2), "10.0.0.6", 32),
        ];

        let rows = build_interface_rows(&adapters, &addresses, AddressFamily::IPv4).unwrap();
        assert_eq!(rows[0].ipv4, vec!["10.0.0.5", "10.0.0.6"]);
        assert!(rows[0].ipv6.is_empty());
    }

    #[test]
    fn test_ipv6_rendered_with_prefix() {
        let adapters = vec![adapter("eth0", 2, true)];
        let addresses = vec![
            addr("eth0", Some(2), "fe80::1", 64),
            addr("eth0", Some(2), "2001:db8::5", 128),
        ];

        let rows = build_interface_rows(&adapters, &addresses, AddressFamily::IPv6).unwrap();
        assert_eq!(rows[0].ipv6, vec!["fe80::1/64", "2001:db8::5/128"]);
        assert!(rows[0].ipv4.is_empty());
    }

    #[test]
    fn test_join_by_name_is_case_sensitive() {
        let mut upper = adapter("Ethernet", 0, true);
        upper.index = None;
        let mut lower = adapter("ethernet", 0, true);
        lower.index = None;

        let addresses = vec![addr("ethernet", None, "192.168.0.2", 24)];
        let rows =
            build_interface_rows(&[upper, lower], &addresses, AddressFamily::IPv4).unwrap();
        assert!(rows[0].ipv4.is_empty());
        assert_eq!(rows[1].ipv4, vec!["192.168.0.2"]);
    }

    #[test]
    fn test_join_prefers_index_over_name() {
        // Two adapters share a name; the index decides
        let adapters = vec![adapter("veth", 5, true), adapter("veth", 6, true)];
        let addresses = vec![addr("veth", Some(6), "10.9.0.1", 30)];

        let rows = build_interface_rows(&adapters, &addresses, AddressFamily::IPv4).unwrap();
        assert!(rows[0].ipv4.is_empty());
        assert_eq!(rows[1].ipv4, vec!["10.9.0.1"]);
    }

    #[test]
    fn test_other_family_records_are_not_rendered() {
        let adapters = vec![adapter("eth0", 2, true)];
        let addresses = vec![
            addr("eth0", Some(2), "10.0.0.5", 24),
            addr("eth0", Some(2), "fe80::1", 64),
        ];

        let rows = build_interface_rows(&adapters, &addresses, AddressFamily::IPv4).unwrap();
        assert_eq!(rows[0].ipv4, vec!["10.0.0.5"]);
        assert!(rows[0].ipv6.is_empty());
    }

    #[test]
    fn test_orphan_address_creates_no_row() {
        let adapters = vec![adapter("eth0", 2, true)];
        let addresses = vec![addr("ghost0", Some(99), "10.0.0.5", 24)];

        let rows = build_interface_rows(&adapters, &addresses, AddressFamily::IPv4).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ipv4.is_empty());
    }

    #[test]
    fn test_enabled_flag_fallback() {
        let mut a = adapter("wlan0", 4, true);
        a.admin_status = None;
        a.enabled = Some(false);

        let rows = build_interface_rows(&[a], &[], AddressFamily::IPv4).unwrap();
        assert_eq!(rows[0].admin_status, AdminStatus::Down);
    }

    #[test]
    fn test_missing_status_fails_loudly() {
        let mut a = adapter("wlan0", 4, true);
        a.admin_status = None;
        a.enabled = None;

        let err = build_interface_rows(&[a], &[], AddressFamily::IPv4).unwrap_err();
        assert!(matches!(err, ActionError::AdapterStatusUnavailable(ref n) if n == "wlan0"));
    }

    #[test]
    fn test_routes_sorted_by_metric_then_destination() {
        let rows = build_route_rows(vec![
            route("192.168.1.0/24", None, "eth0", 100),
            route("0.0.0.0/0", Some("192.168.1.1"), "eth0", 100),
            route("10.0.0.0/8", Some("10.255.0.1"), "tun0", 50),
            route("172.16.0.0/12", None, "eth1", 100),
        ]);

        let order: Vec<(&str, u32)> = rows
            .iter()
            .map(|r| (r.destination.as_str(), r.route_metric))
            .collect();
        assert_eq!(
            order,
            vec![
                ("10.0.0.0/8", 50),
                ("0.0.0.0/0", 100),
                ("172.16.0.0/12", 100),
                ("192.168.1.0/24", 100),
            ]
        );
    }

    #[test]
    fn test_absent_next_hop_becomes_dash() {
        let rows = build_route_rows(vec![
            route("192.168.1.0/24", None, "eth0", 0),
            route("10.0.0.0/8", Some(""), "eth0", 1),
            route("0.0.0.0/0", Some("192.168.1.1"), "eth0", 2),
        ]);
        assert_eq!(rows[0].next_hop, "-");
        assert_eq!(rows[1].next_hop, "-");
        assert_eq!(rows[2].next_hop, "192.168.1.1");
    }

    #[test]
    fn test_empty_route_table() {
        assert!(build_route_rows(Vec::new()).is_empty());
    }

    #[test]
    fn test_ping_half_lost() {
        let probes = [
            ProbeResult::Reply(120.0),
            ProbeResult::Reply(130.0),
            ProbeResult::Timeout,
            ProbeResult::Timeout,
        ];
        let summary = build_ping_summary("8.8.8.8", 4, &probes);
        assert_eq!(
            summary,
            PingSummary::Replied {
                target: "8.8.8.8".into(),
                sent: 4,
                received: 2,
                loss_percent: 50,
                avg_latency_ms: 125.0,
            }
        );
        assert_eq!(summary.to_string(), "8.8.8.8: sent=4 received=2 loss=50% avg=125.00ms");
    }

    #[test]
    fn test_ping_all_timeouts() {
        for count in [1, 4, 10] {
            let probes = vec![ProbeResult::Timeout; count as usize];
            assert_eq!(build_ping_summary("10.0.0.1", count, &probes), PingSummary::NoReply);
        }
        assert_eq!(build_ping_summary("10.0.0.1", 4, &[]), PingSummary::NoReply);
    }

    #[test]
    fn test_ping_loss_truncates() {
        // 1 of 3 lost: 33.33% -> 33; 2 of 3 lost: 66.67% -> 66
        let one_lost = [ProbeResult::Reply(1.0), ProbeResult::Reply(1.0), ProbeResult::Timeout];
        match build_ping_summary("h", 3, &one_lost) {
            PingSummary::Replied { loss_percent, .. } => assert_eq!(loss_percent, 33),
            other => panic!("unexpected {:?}", other),
        }

        let two_lost = [ProbeResult::Reply(1.0), ProbeResult::Timeout, ProbeResult::Timeout];
        match build_ping_summary("h", 3, &two_lost) {
            PingSummary::Replied { loss_percent, .. } => assert_eq!(loss_percent, 66),
            other => panic!("unexpected {:?}", other),
        }

        // 9 of 10 received is exactly 10%, not 9
        let mut nine = vec![ProbeResult::Reply(5.0); 9];
        nine.push(ProbeResult::Timeout);
        match build_ping_summary("h", 10, &nine) {
            PingSummary::Replied { loss_percent, .. } => assert_eq!(loss_percent, 10),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ping_full_reply() {
        let probes = [ProbeResult::Reply(0.5), ProbeResult::Reply(0.25)];
        let summary = build_ping_summary("::1", 2, &probes);
        assert_eq!(summary.to_string(), "::1: sent=2 received=2 loss=0% avg=0.38ms");
    }

    #[test]
    fn test_ping_ignores_results_beyond_count() {
        let probes = [
            ProbeResult::Reply(100.0),
            ProbeResult::Reply(200.0),
            ProbeResult::Reply(900.0),
        ];
        let summary = build_ping_summary("10.0.0.1", 2, &probes);
        assert_eq!(summary.to_string(), "10.0.0.1: sent=2 received=2 loss=0% avg=150.00ms");

        // Replies only past the count do not turn a silent host into a reply
        let late = [ProbeResult::Timeout, ProbeResult::Reply(3.0)];
        assert_eq!(build_ping_summary("10.0.0.1", 1, &late), PingSummary::NoReply);
    }

    #[test]
    fn test_neighbors_sorted_and_unresolved_marked() {
        let entry = |ip: &str, lladdr: Option<&str>, dev: &str, state: &str| NeighborRecord {
            address: ip.parse().unwrap(),
            link_layer_address: lladdr.map(str::to_string),
            interface_alias: dev.to_string(),
            state: state.to_string(),
        };
        let rows = build_neighbor_rows(vec![
            entry("192.168.1.20", None, "eth0", "FAILED"),
            entry("10.8.0.1", Some("02:00:00:00:00:01"), "tun0", "PERMANENT"),
            entry("192.168.1.3", Some("aa:bb:cc:dd:ee:ff"), "eth0", "REACHABLE"),
        ]);

        let order: Vec<&str> = rows.iter().map(|r| r.ip_address.as_str()).collect();
        // numeric address order, not string order
        assert_eq!(order, vec!["192.168.1.3", "192.168.1.20", "10.8.0.1"]);
        assert_eq!(rows[1].link_layer_address, "-");
        assert_eq!(rows[1].state, "FAILED");
        assert_eq!(rows[2].interface_alias, "tun0");
    }

    #[test]
    fn test_hop_rows() {
        let rows = build_hop_rows(vec![
            HopRecord {
                hop: 2,
                address: None,
                probes: vec![ProbeResult::Timeout; 3],
            },
            HopRecord {
                hop: 1,
                address: Some("192.168.1.1".parse().unwrap()),
                probes: vec![
                    ProbeResult::Reply(0.512),
                    ProbeResult::Timeout,
                    ProbeResult::Reply(0.455),
                ],
            },
        ]);

        assert_eq!(rows[0].hop, 1);
        assert_eq!(rows[0].address, "192.168.1.1");
        assert_eq!(rows[0].avg_latency_ms, Some(0.48));
        assert_eq!(rows[1].hop, 2);
        assert_eq!(rows[1].address, "*");
        assert_eq!(rows[1].avg_latency_ms, None);
    }

    #[test]
    fn test_latency_rounding() {
        assert_eq!(round_2dp(12.344), 12.34);
        assert_eq!(round_2dp(12.346), 12.35);
        assert_eq!(round_2dp(0.125), 0.13);
        assert_eq!(round_2dp(125.0), 125.0);
    }
}
