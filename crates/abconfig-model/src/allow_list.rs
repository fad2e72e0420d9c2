//! IP allow-lists
//!
//! Addresses on a condition's allow-list are exempted from that condition.
//! Entries are separated by newlines or commas and `#` starts a comment.
//! Each entry is one of:
//! - an exact address: `10.1.2.3`, `2001:db8::1`
//! - a CIDR block: `10.0.0.0/8`, `2001:db8::/32`
//! - a last-group range: `10.1.2.1-20`, `2001:db8::1-ff`
//! - a group-boundary prefix: `192.168.` or `192.168`

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum IpRule {
    Exact(IpAddr),
    Cidr { network: IpAddr, prefix: u8 },
    Range { start: IpAddr, last: u16 },
    Prefix(String),
}

impl IpRule {
    fn parse(entry: &str) -> Option<Self> {
        if let Ok(addr) = entry.parse::<IpAddr>() {
            return Some(Self::Exact(addr));
        }
        if let Some((addr, bits)) = entry.split_once('/') {
            let network = addr.trim().parse::<IpAddr>().ok()?;
            let prefix = bits.trim().parse::<u8>().ok()?;
            let width = if network.is_ipv4() { 32 } else { 128 };
            return (prefix <= width).then_some(Self::Cidr { network, prefix });
        }
        if let Some((addr, last)) = entry.split_once('-') {
            let start = addr.trim().parse::<IpAddr>().ok()?;
            let last = match start {
                IpAddr::V4(_) => last.trim().parse::<u16>().ok().filter(|v| *v <= 255)?,
                IpAddr::V6(_) => u16::from_str_radix(last.trim(), 16).ok()?,
            };
            return Some(Self::Range { start, last });
        }
        if entry.chars().all(|c| c.is_ascii_digit() || c == '.') {
            let mut prefix = entry.to_string();
            if !prefix.ends_with('.') {
                prefix.push('.');
            }
            return Some(Self::Prefix(prefix));
        }
        if entry.ends_with(':') && entry.chars().all(|c| c.is_ascii_hexdigit() || c == ':') {
            return Some(Self::Prefix(entry.to_ascii_lowercase()));
        }
        None
    }

    fn contains(&self, addr: IpAddr) -> bool {
        match self {
            Self::Exact(exact) => *exact == addr,
            Self::Cidr { network, prefix } => match (network, addr) {
                (IpAddr::V4(net), IpAddr::V4(ip)) => {
                    let mask = u32::MAX.checked_shl(32 - u32::from(*prefix)).unwrap_or(0);
                    u32::from(*net) & mask == u32::from(ip) & mask
                }
                (IpAddr::V6(net), IpAddr::V6(ip)) => {
                    let mask = u128::MAX.checked_shl(128 - u32::from(*prefix)).unwrap_or(0);
                    u128::from(*net) & mask == u128::from(ip) & mask
                }
                _ => false,
            },
            Self::Range { start, last } => match (start, addr) {
                (IpAddr::V4(start), IpAddr::V4(ip)) => {
                    let (s, a) = (start.octets(), ip.octets());
                    s[..3] == a[..3] && u16::from(a[3]) >= u16::from(s[3]) && u16::from(a[3]) <= *last
                }
                (IpAddr::V6(start), IpAddr::V6(ip)) => {
                    let (s, a) = (start.segments(), ip.segments());
                    s[..7] == a[..7] && a[7] >= s[7] && a[7] <= *last
                }
                _ => false,
            },
            Self::Prefix(prefix) => addr.to_string().starts_with(prefix.as_str()),
        }
    }
}

/// Addresses exempted from a condition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct IpAllowList {
    raw: String,
    rules: Vec<IpRule>,
}

impl IpAllowList {
    /// Parse an allow-list, skipping entries that are not understood
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let rules = raw
            .lines()
            .flat_map(|line| line.split('#').next().unwrap_or_default().split(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let rule = IpRule::parse(entry);
                if rule.is_none() {
                    tracing::debug!(entry, "ignoring unrecognised allow-list entry");
                }
                rule
            })
            .collect();
        Self {
            raw: raw.to_string(),
            rules,
        }
    }

    /// Whether the address is on the list
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.rules.iter().any(|rule| rule.contains(addr))
    }

    /// Whether a textual address is on the list
    ///
    /// A missing or unparseable address counts as listed, so callers that
    /// cannot identify the client never target it.
    #[must_use]
    pub fn contains_remote(&self, remote: Option<&str>) -> bool {
        match remote.and_then(|r| r.trim().parse::<IpAddr>().ok()) {
            Some(addr) => self.contains(addr),
            None => true,
        }
    }

    /// Original text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether no usable entries were parsed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<String> for IpAllowList {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for IpAllowList {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<IpAllowList> for String {
    fn from(list: IpAllowList) -> Self {
        list.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn exact_addresses() {
        let list = IpAllowList::parse("10.1.2.3\n2001:db8::1");
        assert!(list.contains(ip("10.1.2.3")));
        assert!(list.contains(ip("2001:db8::1")));
        assert!(!list.contains(ip("10.1.2.4")));
    }

    #[test]
    fn cidr_blocks() {
        let list = IpAllowList::parse("192.168.0.0/16, 2001:db8::/32");
        assert!(list.contains(ip("192.168.44.2")));
        assert!(!list.contains(ip("192.169.0.1")));
        assert!(list.contains(ip("2001:db8:ffff::9")));
        assert!(!list.contains(ip("2001:db9::1")));
    }

    #[test]
    fn zero_prefix_matches_whole_family() {
        let list = IpAllowList::parse("0.0.0.0/0");
        assert!(list.contains(ip("8.8.8.8")));
        assert!(!list.contains(ip("::1")));
    }

    #[test]
    fn last_group_ranges() {
        let list = IpAllowList::parse("10.0.0.5-20");
        assert!(list.contains(ip("10.0.0.5")));
        assert!(list.contains(ip("10.0.0.20")));
        assert!(!list.contains(ip("10.0.0.21")));
        assert!(!list.contains(ip("10.0.1.10")));
    }

    #[test]
    fn partial_prefixes_stop_at_group_boundary() {
        let list = IpAllowList::parse("192.168");
        assert!(list.contains(ip("192.168.1.1")));
        assert!(!list.contains(ip("192.16.1.1")));
        assert!(!list.contains(ip("10.192.168.1")));
    }

    #[test]
    fn comments_and_garbage_are_ignored() {
        let list = IpAllowList::parse("# office\n10.0.0.1 # vpn\nnot-an-ip\n");
        assert!(list.contains(ip("10.0.0.1")));
        assert!(!list.is_empty());
        assert!(IpAllowList::parse("").is_empty());
    }

    #[test]
    fn missing_remote_counts_as_listed() {
        let list = IpAllowList::parse("");
        assert!(list.contains_remote(None));
        assert!(list.contains_remote(Some("garbage")));
        assert!(!list.contains_remote(Some("10.0.0.1")));
    }

    #[test]
    fn serde_keeps_original_text() {
        let list = IpAllowList::parse("10.0.0.1\n# note");
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, "\"10.0.0.1\\n# note\"");
        let back: IpAllowList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }
}
