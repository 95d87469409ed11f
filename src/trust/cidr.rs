//! CIDR network ranges.
//!
//! # Design Decisions
//! - The prefix length is mandatory ("10.0.0.1" alone is rejected)
//! - The stored network address is masked, so "10.1.2.3/8" equals "10.0.0.0/8"
//! - IPv4-mapped IPv6 addresses match IPv4 ranges

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use thiserror::Error;

/// Errors produced while parsing a CIDR string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    #[error("invalid CIDR address: {0}")]
    MissingPrefix(String),

    #[error("invalid CIDR address: {0}")]
    InvalidAddress(String),

    #[error("invalid CIDR prefix length: {0}")]
    InvalidPrefix(String),
}

/// A network range: base address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr(IpNet);

impl Cidr {
    /// Build a range from an address and prefix length, masking host bits.
    pub fn new(addr: IpAddr, prefix: u8) -> Option<Self> {
        IpNet::new(addr, prefix).ok().map(|net| Self(net.trunc()))
    }

    pub fn network(&self) -> IpAddr {
        self.0.network()
    }

    pub fn prefix(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Returns true if `ip` falls inside this range.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(&ip.to_canonical())
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| CidrError::MissingPrefix(s.to_string()))?;

        let addr: IpAddr = addr
            .parse()
            .map_err(|_| CidrError::InvalidAddress(s.to_string()))?;

        // Reject signs and whitespace that `u8::from_str` would tolerate.
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CidrError::InvalidPrefix(s.to_string()));
        }
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| CidrError::InvalidPrefix(s.to_string()))?;

        Cidr::new(addr, prefix).ok_or_else(|| CidrError::InvalidPrefix(s.to_string()))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
