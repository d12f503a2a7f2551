// RouteSynth: Synthesizing Routing Policies from Path Requirements
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! IPv4 interface addresses with their prefix length.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Error while parsing an address in the `a.b.c.d/len` notation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddrParseError {
    /// The address part is no valid IPv4 address
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),
    /// The prefix length is not a number between 0 and 32
    #[error("Invalid prefix length: {0}")]
    InvalidMask(String),
}

/// IPv4 address together with the mask of the network it lives in. Written as `10.0.1.1/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddr {
    /// Address
    pub addr: Ipv4Addr,
    /// Network Mask (prefix length)
    pub mask: u32,
}

impl IpAddr {
    /// Create a new IP addr. The mask is clamped to 32.
    pub fn new(addr: Ipv4Addr, mask: u32) -> Self {
        Self { addr, mask: mask.min(32) }
    }

    fn mask_bits(&self) -> u32 {
        if self.mask == 0 {
            0
        } else {
            u32::MAX << (32 - self.mask)
        }
    }

    /// represent mask as xxx.xxx.xxx.xxx
    ///
    /// ```
    /// # use routesynth::topology::IpAddr;
    /// let addr: IpAddr = "10.100.22.5/17".parse().unwrap();
    /// assert_eq!(addr.repr_mask(), "255.255.128.0");
    /// ```
    pub fn repr_mask(&self) -> String {
        Ipv4Addr::from(self.mask_bits()).to_string()
    }

    /// represent the inverted mask, as used by the `network` statement of OSPF.
    ///
    /// ```
    /// # use routesynth::topology::IpAddr;
    /// let addr: IpAddr = "10.100.22.5/24".parse().unwrap();
    /// assert_eq!(addr.repr_wildcard(), "0.0.0.255");
    /// ```
    pub fn repr_wildcard(&self) -> String {
        Ipv4Addr::from(!self.mask_bits()).to_string()
    }

    /// Get the address, masked with the mask.
    ///
    /// ```
    /// # use routesynth::topology::IpAddr;
    /// let addr: IpAddr = "10.100.22.5/16".parse().unwrap();
    /// assert_eq!(addr.network().to_string(), "10.100.0.0/16");
    /// ```
    pub fn network(&self) -> IpAddr {
        Self::new(Ipv4Addr::from(u32::from(self.addr) & self.mask_bits()), self.mask)
    }

    /// Returns true if both addresses lie in the same network (using the mask of `self`).
    pub fn same_network(&self, other: &IpAddr) -> bool {
        let mask = self.mask_bits();
        u32::from(self.addr) & mask == u32::from(other.addr) & mask
    }
}

impl fmt::Display for IpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

impl FromStr for IpAddr {
    type Err = AddrParseError;

    /// Parses `a.b.c.d/len`. A missing prefix length denotes a host address (`/32`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, mask) = match s.split_once('/') {
            Some((addr, mask)) => (addr, Some(mask)),
            None => (s, None),
        };
        let addr: Ipv4Addr =
            addr.parse().map_err(|_| AddrParseError::InvalidAddress(addr.to_string()))?;
        let mask = match mask {
            Some(m) => match m.parse::<u32>() {
                Ok(x) if x <= 32 => x,
                _ => return Err(AddrParseError::InvalidMask(m.to_string())),
            },
            None => 32,
        };
        Ok(Self { addr, mask })
    }
}

impl TryFrom<String> for IpAddr {
    type Error = AddrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpAddr> for String {
    fn from(addr: IpAddr) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn ip_addr() {
        assert_eq!(&addr("1.2.3.4/4").repr_mask(), "240.0.0.0");
        assert_eq!(&addr("1.2.3.4/11").repr_mask(), "255.224.0.0");
        assert_eq!(&addr("1.2.3.4/15").repr_mask(), "255.254.0.0");
        assert_eq!(&addr("1.2.3.4/24").repr_mask(), "255.255.255.0");
        assert_eq!(&addr("1.2.3.4/25").repr_mask(), "255.255.255.128");
        assert_eq!(&addr("1.2.3.4/0").repr_mask(), "0.0.0.0");
        assert_eq!(&addr("1.2.3.4").repr_mask(), "255.255.255.255");
        assert_eq!(&addr("1.2.3.4/30").repr_wildcard(), "0.0.0.3");
    }

    #[test]
    fn ip_network() {
        assert_eq!(addr("10.0.3.2/24").network(), addr("10.0.3.0/24"));
        assert!(addr("10.0.3.2/24").same_network(&addr("10.0.3.1/24")));
        assert!(!addr("10.0.3.2/24").same_network(&addr("10.0.4.1/24")));
    }

    #[test]
    fn ip_parse_errors() {
        assert_eq!(
            "10.0.0/24".parse::<IpAddr>(),
            Err(AddrParseError::InvalidAddress("10.0.0".to_string()))
        );
        assert_eq!(
            "10.0.0.1/33".parse::<IpAddr>(),
            Err(AddrParseError::InvalidMask("33".to_string()))
        );
    }
}
