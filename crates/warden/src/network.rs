//! Network origin classification for the validation bypass.
//!
//! Both predicates work on the address string as the gateway resolved it
//! and are total: anything unparseable is simply "not local" / "not allowed".

use std::collections::HashSet;

use warden_common::constants::LOOPBACK_ADDRESSES;

/// True for loopback, the unspecified address, and RFC1918 ranges
///
/// The 172.16.0.0/12 block is checked on the second octet; a bare `172.`
/// prefix would also match public space such as 172.217.x.x.
pub fn is_private_network(address: &str) -> bool {
    if LOOPBACK_ADDRESSES.contains(&address) {
        return true;
    }

    if address.starts_with("192.168.") || address.starts_with("10.") {
        return true;
    }

    if let Some(rest) = address.strip_prefix("172.") {
        return rest
            .split('.')
            .next()
            .and_then(|octet| octet.parse::<u8>().ok())
            .is_some_and(|octet| (16..=31).contains(&octet));
    }

    false
}

/// Explicit list of client addresses that skip verification
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    addresses: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact string membership, no CIDR matching
    pub fn is_explicitly_allowed(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }
}

/// Decides whether a client address bypasses upstream verification
#[derive(Debug, Clone, Default)]
pub struct NetworkPolicy {
    pub allow_list: AllowList,
    /// Trust private/local addresses without verification
    pub auto_validate_local_ip: bool,
}

impl NetworkPolicy {
    pub fn new(allow_list: AllowList, auto_validate_local_ip: bool) -> Self {
        Self {
            allow_list,
            auto_validate_local_ip,
        }
    }

    pub fn bypasses(&self, address: &str) -> bool {
        self.allow_list.is_explicitly_allowed(address)
            || (self.auto_validate_local_ip && is_private_network(address))
    }
}
