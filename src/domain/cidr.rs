// Copyright (c) 2025 - Cowboy AI, Inc.
//! CIDR Block Value Object with Validation Invariants
//!
//! Address arithmetic is done on `u128` for both families so IPv4 and IPv6
//! blocks share one implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4, 0-128 for IPv6)")]
    InvalidPrefixLength(u8),
}

/// A CIDR block value object
///
/// Invariants:
/// - Valid base address and prefix length for its family
/// - Canonical form: host bits of the base address are zero
///   (`10.0.0.7/24` is stored as `10.0.0.0/24`)
///
/// # Examples
///
/// ```rust
/// use cim_dcim_allocation::domain::CidrBlock;
///
/// let block = CidrBlock::new("10.0.0.0/30").unwrap();
/// let hosts: Vec<String> = block.usable_hosts().map(|a| a.to_string()).collect();
/// assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2"]);
/// assert_eq!(block.broadcast_address().to_string(), "10.0.0.3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock {
    network: IpAddr,
    prefix_length: u8,
}

impl CidrBlock {
    /// Parse `address/prefix` notation
    ///
    /// # Invariants
    /// - Prefix length 0-32 for IPv4, 0-128 for IPv6
    /// - A missing prefix is rejected; a pool is always a block
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref().trim();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = IpAddr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_length)
    }

    /// Create from a base address and prefix, normalising host bits away
    pub fn from_parts(address: IpAddr, prefix_length: u8) -> Result<Self, NetworkError> {
        let bits = family_bits(&address);
        if prefix_length > bits {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        let mask = network_mask(bits, prefix_length);
        let network = from_u128(&address, to_u128(&address) & mask);

        Ok(Self {
            network,
            prefix_length,
        })
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.network, IpAddr::V4(_))
    }

    /// First address of the block
    pub fn network_address(&self) -> IpAddr {
        self.network
    }

    /// Last address of the block
    pub fn broadcast_address(&self) -> IpAddr {
        from_u128(&self.network, self.last())
    }

    /// Number of addresses in the block, saturating at `u128::MAX` for `::/0`
    pub fn size(&self) -> u128 {
        let host_bits = u32::from(family_bits(&self.network) - self.prefix_length);
        if host_bits >= 128 {
            u128::MAX
        } else {
            1u128 << host_bits
        }
    }

    /// Number of assignable hosts (block size minus network and broadcast)
    pub fn usable_count(&self) -> u128 {
        self.size().saturating_sub(2)
    }

    /// Whether `address` lies inside the block (same family only)
    pub fn contains(&self, address: &IpAddr) -> bool {
        if address.is_ipv4() != self.network.is_ipv4() {
            return false;
        }
        let value = to_u128(address);
        value >= self.first() && value <= self.last()
    }

    /// Whether two blocks share any address
    ///
    /// Two CIDR blocks are either disjoint or nested, so it is enough to test
    /// whether either block's network or broadcast address falls inside the
    /// other. Blocks of different families never overlap.
    pub fn overlaps(&self, other: &CidrBlock) -> bool {
        self.contains(&other.network_address())
            || self.contains(&other.broadcast_address())
            || other.contains(&self.network_address())
            || other.contains(&self.broadcast_address())
    }

    /// Every address in the block, network and broadcast included, ascending
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        (self.first()..=self.last()).map(move |value| from_u128(&self.network, value))
    }

    /// Assignable host addresses, ascending
    ///
    /// Network and broadcast addresses are always excluded, so `/31` and `/32`
    /// (and `/127`, `/128`) blocks have no usable hosts.
    pub fn usable_hosts(&self) -> impl Iterator<Item = IpAddr> + '_ {
        let start = self.first().saturating_add(1);
        (start..self.last()).map(move |value| from_u128(&self.network, value))
    }

    /// Whether `address` is one of [`usable_hosts`](Self::usable_hosts)
    pub fn is_usable_host(&self, address: &IpAddr) -> bool {
        self.contains(address) && {
            let value = to_u128(address);
            value != self.first() && value != self.last()
        }
    }

    fn first(&self) -> u128 {
        to_u128(&self.network)
    }

    fn last(&self) -> u128 {
        let bits = family_bits(&self.network);
        self.first() | !network_mask(bits, self.prefix_length) & family_max(bits)
    }
}

fn family_bits(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn family_max(bits: u8) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

fn network_mask(bits: u8, prefix_length: u8) -> u128 {
    let host_bits = u32::from(bits - prefix_length);
    let host_mask = if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    };
    family_max(bits) & !host_mask
}

fn to_u128(address: &IpAddr) -> u128 {
    match address {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

// `value` always comes from a block of the same family as `family`, so the
// IPv4 narrowing never truncates.
fn from_u128(family: &IpAddr, value: u128) -> IpAddr {
    match family {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(value as u32)),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_length)
    }
}

impl FromStr for CidrBlock {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CidrBlock {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CidrBlock> for String {
    fn from(block: CidrBlock) -> String {
        block.to_string()
    }
}
