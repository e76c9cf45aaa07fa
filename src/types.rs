//! Core types used throughout pathoracle.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// AS numbers up to this value are written in decimal.
const MAX_BGP_ASN: u64 = u32::MAX as u64;

/// Largest AS number, 48 bits.
pub const MAX_ASN: u64 = (1 << 48) - 1;

/// Isolation domain and AS number pair identifying an endpoint's domain.
///
/// AS numbers are 48 bits wide. A larger value set through the public field
/// is printed with an oversized first group, which does not parse back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IsdAs {
    pub isd: u16,
    pub asn: u64,
}

impl IsdAs {
    /// # Panics
    ///
    /// Panics if `asn` is above [`MAX_ASN`].
    pub fn new(isd: u16, asn: u64) -> Self {
        assert!(asn <= MAX_ASN, "AS number {asn:#x} exceeds 48 bits");
        Self { isd, asn }
    }

    pub fn try_new(isd: u16, asn: u64) -> Result<Self> {
        if asn > MAX_ASN {
            return Err(Error::InvalidAddress(format!("AS number {asn:#x} exceeds 48 bits")));
        }
        Ok(Self { isd, asn })
    }
}

impl fmt::Display for IsdAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.asn <= MAX_BGP_ASN {
            write!(f, "{}-{}", self.isd, self.asn)
        } else {
            write!(
                f,
                "{}-{:x}:{:x}:{:x}",
                self.isd,
                self.asn >> 32,
                (self.asn >> 16) & 0xffff,
                self.asn & 0xffff
            )
        }
    }
}

impl FromStr for IsdAs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(format!("invalid ISD-AS: {s}"));

        let (isd, asn) = s.split_once('-').ok_or_else(invalid)?;
        let isd: u16 = isd.parse().map_err(|_| invalid())?;

        let asn = if asn.contains(':') {
            let groups: Vec<&str> = asn.split(':').collect();
            if groups.len() != 3 {
                return Err(invalid());
            }
            let mut value = 0u64;
            for group in groups {
                let part = u16::from_str_radix(group, 16).map_err(|_| invalid())?;
                value = (value << 16) | u64::from(part);
            }
            value
        } else {
            let value: u64 = asn.parse().map_err(|_| invalid())?;
            if value > MAX_BGP_ASN {
                return Err(invalid());
            }
            value
        };

        Self::try_new(isd, asn).map_err(|_| invalid())
    }
}

impl TryFrom<String> for IsdAs {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<IsdAs> for String {
    fn from(ia: IsdAs) -> Self {
        ia.to_string()
    }
}

/// A connection endpoint: domain plus host address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ia: IsdAs,
    pub addr: SocketAddr,
}

impl Endpoint {
    pub fn new(ia: IsdAs, addr: SocketAddr) -> Self {
        Self { ia, addr }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr.ip() {
            IpAddr::V4(ip) => write!(f, "{},[{}]:{}", self.ia, ip, self.addr.port()),
            IpAddr::V6(_) => write!(f, "{},{}", self.ia, self.addr),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (ia, host) = s
            .split_once(',')
            .ok_or_else(|| Error::InvalidAddress(format!("missing ISD-AS in {s}")))?;
        let ia: IsdAs = ia.parse()?;

        // IPv4 hosts are commonly written bracketed, which SocketAddr rejects.
        let host = match host.strip_prefix('[').and_then(|h| h.split_once("]:")) {
            Some((ip, port)) if !ip.contains(':') => format!("{ip}:{port}"),
            _ => host.to_string(),
        };
        let addr: SocketAddr = host
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid host address in {s}")))?;

        Ok(Self { ia, addr })
    }
}

/// Opaque key identifying a route across path refreshes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathFingerprint(pub String);

impl PathFingerprint {
    pub fn new(fp: impl Into<String>) -> Self {
        Self(fp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PathFingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PathFingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One hop of a path: an interface of an AS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PathInterface {
    pub ia: IsdAs,
    pub ifid: u64,
}

impl PathInterface {
    pub fn new(ia: IsdAs, ifid: u64) -> Self {
        Self { ia, ifid }
    }
}

impl fmt::Display for PathInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ia, self.ifid)
    }
}

/// Path metadata as delivered by path discovery.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathMetadata {
    /// Interfaces in traversal order; one entry per hop.
    #[serde(default)]
    pub interfaces: Vec<PathInterface>,
}

/// A candidate route to the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub fingerprint: PathFingerprint,
    #[serde(default)]
    pub metadata: PathMetadata,
}

impl Path {
    pub fn new(fingerprint: impl Into<PathFingerprint>, interfaces: Vec<PathInterface>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            metadata: PathMetadata { interfaces },
        }
    }

    /// Number of hops on this path.
    pub fn hops(&self) -> usize {
        self.metadata.interfaces.len()
    }

    /// Whether this path crosses the given interface.
    pub fn traverses(&self, interface: &PathInterface) -> bool {
        self.metadata.interfaces.iter().any(|i| i == interface)
    }

    /// Whether this path is affected by a path-down event.
    pub fn is_down(&self, fingerprint: &PathFingerprint, interface: &PathInterface) -> bool {
        &self.fingerprint == fingerprint || self.traverses(interface)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} hops)", self.fingerprint, self.hops())
    }
}

/// Drop candidates whose fingerprint was already seen, keeping the first.
pub fn dedup_paths(paths: Vec<Path>) -> Vec<Path> {
    let mut seen = std::collections::HashSet::with_capacity(paths.len());
    paths
        .into_iter()
        .filter(|p| seen.insert(p.fingerprint.clone()))
        .collect()
}
