/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use super::LexicalError;
use smol_str::SmolStr;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// A port range: `80`, `80-`, `-1024` or `80-8080`. Either end may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortRange {
    lower: Option<u16>,
    upper: Option<u16>,
}

impl PortRange {
    /// Whether `port` lies inside the range
    pub fn contains(&self, port: u16) -> bool {
        self.lower.is_none_or(|l| l <= port) && self.upper.is_none_or(|u| port <= u)
    }

    /// Whether both ends are open
    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

fn parse_port(s: &str) -> Result<Option<u16>, LexicalError> {
    if s.is_empty() {
        Ok(None)
    } else {
        s.parse()
            .map(Some)
            .map_err(|_| LexicalError::new(format!("`{s}` is not a port number")))
    }
}

impl FromStr for PortRange {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            None => {
                let port = parse_port(s)?;
                Ok(Self {
                    lower: port,
                    upper: port,
                })
            }
            Some((lower, upper)) => {
                let range = Self {
                    lower: parse_port(lower)?,
                    upper: parse_port(upper)?,
                };
                match (range.lower, range.upper) {
                    (Some(l), Some(u)) if l > u => {
                        Err(LexicalError::new("port range lower bound exceeds upper bound"))
                    }
                    _ => Ok(range),
                }
            }
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if l == u => write!(f, "{l}"),
            (l, u) => {
                if let Some(l) = l {
                    write!(f, "{l}")?;
                }
                write!(f, "-")?;
                if let Some(u) = u {
                    write!(f, "{u}")?;
                }
                Ok(())
            }
        }
    }
}

/// An IPv4 or IPv6 address with an optional mask and port range.
///
/// IPv6 components are written in brackets: `[::1]/[ffff::]:443`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpAddress {
    address: IpAddr,
    mask: Option<IpAddr>,
    ports: PortRange,
}

impl IpAddress {
    /// The address
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// The network mask, if any
    pub fn mask(&self) -> Option<IpAddr> {
        self.mask
    }

    /// The port range (unbounded if absent)
    pub fn ports(&self) -> PortRange {
        self.ports
    }

    fn parse_v6(s: &str) -> Result<Self, LexicalError> {
        let bracketed = |s: &str| -> Result<(Ipv6Addr, usize), LexicalError> {
            let end = s
                .find(']')
                .ok_or_else(|| LexicalError::new("unterminated `[`"))?;
            let inner = s.get(1..end).unwrap_or_default();
            let addr = inner
                .parse()
                .map_err(|_| LexicalError::new(format!("`{inner}` is not an IPv6 address")))?;
            Ok((addr, end + 1))
        };
        let (address, consumed) = bracketed(s)?;
        let mut rest = s.get(consumed..).unwrap_or_default();
        let mut mask = None;
        if let Some(m) = rest.strip_prefix('/') {
            let (m, consumed) = bracketed(m)?;
            mask = Some(IpAddr::V6(m));
            rest = rest.get(1 + consumed..).unwrap_or_default();
        }
        let ports = match rest.strip_prefix(':') {
            Some(p) => p.parse()?,
            None if rest.is_empty() => PortRange::default(),
            None => return Err(LexicalError::new(format!("unexpected `{rest}`"))),
        };
        Ok(Self {
            address: IpAddr::V6(address),
            mask,
            ports,
        })
    }

    fn parse_v4(s: &str) -> Result<Self, LexicalError> {
        let (addr_and_mask, ports) = match s.split_once(':') {
            Some((a, p)) => (a, p.parse()?),
            None => (s, PortRange::default()),
        };
        let v4 = |s: &str| -> Result<IpAddr, LexicalError> {
            s.parse::<Ipv4Addr>()
                .map(IpAddr::V4)
                .map_err(|_| LexicalError::new(format!("`{s}` is not an IPv4 address")))
        };
        let (address, mask) = match addr_and_mask.split_once('/') {
            Some((a, m)) => (v4(a)?, Some(v4(m)?)),
            None => (v4(addr_and_mask)?, None),
        };
        Ok(Self {
            address,
            mask,
            ports,
        })
    }
}

impl FromStr for IpAddress {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('[') {
            Self::parse_v6(s)
        } else {
            Self::parse_v4(s)
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_addr = |f: &mut fmt::Formatter<'_>, a: IpAddr| match a {
            IpAddr::V4(a) => write!(f, "{a}"),
            IpAddr::V6(a) => write!(f, "[{a}]"),
        };
        write_addr(f, self.address)?;
        if let Some(mask) = self.mask {
            write!(f, "/")?;
            write_addr(f, mask)?;
        }
        if !self.ports.is_unbounded() {
            write!(f, ":{}", self.ports)?;
        }
        Ok(())
    }
}

/// A DNS host name, optionally a `*.` wildcard domain, with an optional port
/// range. The host is stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsName {
    host: SmolStr,
    ports: PortRange,
}

impl DnsName {
    /// The lower-cased host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port range (unbounded if absent)
    pub fn ports(&self) -> PortRange {
        self.ports
    }
}

impl FromStr for DnsName {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, ports) = match s.split_once(':') {
            Some((h, p)) => (h, p.parse()?),
            None => (s, PortRange::default()),
        };
        let labels = host.strip_prefix("*.").unwrap_or(host);
        let valid = !labels.is_empty()
            && labels.split('.').all(|label| {
                !label.is_empty()
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                    && !label.starts_with('-')
                    && !label.ends_with('-')
            });
        if !valid {
            return Err(LexicalError::new(format!("`{host}` is not a host name")));
        }
        Ok(Self {
            host: host.to_ascii_lowercase().into(),
            ports,
        })
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if !self.ports.is_unbounded() {
            write!(f, ":{}", self.ports)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ipv4_forms() {
        let a: IpAddress = "10.0.0.1/255.0.0.0:80-443".parse().unwrap();
        assert_eq!(a.to_string(), "10.0.0.1/255.0.0.0:80-443");
        assert!(a.ports().contains(80));
        assert!(!a.ports().contains(8080));
        let b: IpAddress = "192.168.1.1".parse().unwrap();
        assert_eq!(b.mask(), None);
        assert!(b.ports().is_unbounded());
        assert!("300.0.0.1".parse::<IpAddress>().is_err());
    }

    #[test]
    fn ipv6_forms() {
        let a: IpAddress = "[::1]/[ffff::]:1024-".parse().unwrap();
        assert_eq!(a.to_string(), "[::1]/[ffff::]:1024-");
        assert!(a.ports().contains(65535));
        assert!("[::1".parse::<IpAddress>().is_err());
        assert!("[::1]x".parse::<IpAddress>().is_err());
    }

    #[test]
    fn dns_names() {
        let d: DnsName = "*.Example.COM:-1024".parse().unwrap();
        assert_eq!(d.to_string(), "*.example.com:-1024");
        assert!("bad_host".parse::<DnsName>().is_err());
        assert!("a..b".parse::<DnsName>().is_err());
        assert!("8080-80".parse::<PortRange>().is_err());
    }
}
