//! Input validation
//!
//! Every string that ends up on an `ip`/`ping` command line passes through
//! here first.

use crate::error::{ActionError, NetResult};
use crate::types::AddressFamily;
use std::net::IpAddr;

/// Maximum length for interface names (Linux kernel limit is 15)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Maximum length of a single-line error message
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Validate an interface name
///
/// Alphanumerics plus `-`, `_`, `.`, `@` and `:`, at most 15 characters, not
/// starting with a dash.
pub fn validate_interface_name(arg: &str, name: &str) -> NetResult<()> {
    if name.is_empty() {
        return Err(ActionError::invalid(arg, "interface name cannot be empty"));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(ActionError::invalid(
            arg,
            format!("interface name too long (max {} characters)", MAX_INTERFACE_NAME_LEN),
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.' | '@' | ':') {
            return Err(ActionError::invalid(
                arg,
                format!("interface name '{}' contains invalid character '{}'", name, c),
            ));
        }
    }

    if name.starts_with('-') {
        return Err(ActionError::invalid(arg, "interface name cannot start with dash"));
    }

    Ok(())
}

/// Parse an IP address of the given family
pub fn validate_ip_address(arg: &str, addr: &str, family: AddressFamily) -> NetResult<IpAddr> {
    let ip = addr
        .parse::<IpAddr>()
        .map_err(|_| ActionError::invalid(arg, format!("'{}' is not an IP address", addr)))?;

    if !family.matches(&ip) {
        return Err(ActionError::invalid(
            arg,
            format!("'{}' is not an {} address", addr, family),
        ));
    }

    Ok(ip)
}

/// Validate prefix length for a family
pub fn validate_prefix_len(arg: &str, prefix: u32, family: AddressFamily) -> NetResult<u8> {
    let max = family.max_prefix_len();
    if prefix > u32::from(max) {
        return Err(ActionError::invalid(
            arg,
            format!("prefix length {} exceeds maximum {}", prefix, max),
        ));
    }
    Ok(prefix as u8)
}

/// Parse `address/prefixLength`
pub fn parse_prefix(arg: &str, value: &str, family: AddressFamily) -> NetResult<(IpAddr, u8)> {
    let (addr, len) = value
        .split_once('/')
        .ok_or_else(|| ActionError::invalid(arg, format!("'{}' is not of the form address/length", value)))?;

    let ip = validate_ip_address(arg, addr, family)?;
    let len: u32 = len
        .parse()
        .map_err(|_| ActionError::invalid(arg, format!("'{}' is not a prefix length", len)))?;
    let len = validate_prefix_len(arg, len, family)?;

    Ok((ip, len))
}

/// Validate a route destination and return it in CIDR form
///
/// A bare address is taken as a host route.
pub fn parse_destination(arg: &str, value: &str, family: AddressFamily) -> NetResult<String> {
    if value.contains('/') {
        let (ip, len) = parse_prefix(arg, value, family)?;
        Ok(format!("{}/{}", ip, len))
    } else {
        let ip = validate_ip_address(arg, value, family)?;
        Ok(format!("{}/{}", ip, family.max_prefix_len()))
    }
}

/// Validate hostname for ping
pub fn validate_hostname(arg: &str, host: &str) -> NetResult<()> {
    if host.is_empty() {
        return Err(ActionError::invalid(arg, "hostname cannot be empty"));
    }

    if host.len() > 253 {
        return Err(ActionError::invalid(arg, "hostname too long"));
    }

    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    for c in host.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '.' {
            return Err(ActionError::invalid(
                arg,
                format!("invalid hostname character '{}'", c),
            ));
        }
    }

    if host.starts_with('-') || host.starts_with('.') ||
       host.ends_with('-') || host.ends_with('.') {
        return Err(ActionError::invalid(arg, "invalid hostname format"));
    }

    Ok(())
}

/// Fold a message onto one line and bound its length
pub fn single_line_message(message: &str) -> String {
    let mut line = message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    if line.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
        line.push_str("... (truncated)");
    }

    line
}
