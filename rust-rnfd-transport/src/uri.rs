//! Face URIs: `tcp|tcp4|tcp6://host[:port]`, `udp[4|6]://host[:port]`,
//! `unix:///path`.
//!
//! Scope is local for loopback and Unix endpoints; stream sockets and
//! connected datagrams are point-to-point links.

use rust_rnfd_common::types::{FaceScope, LinkType};
use rust_rnfd_common::Error;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// The default NDN port (RFC 8609).
pub const NDN_PORT: u16 = 6363;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
    Unix,
}

impl Scheme {
    pub fn is_tcp(self) -> bool {
        matches!(self, Scheme::Tcp | Scheme::Tcp4 | Scheme::Tcp6)
    }

    pub fn is_udp(self) -> bool {
        matches!(self, Scheme::Udp | Scheme::Udp4 | Scheme::Udp6)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scheme::Tcp => "tcp",
            Scheme::Tcp4 => "tcp4",
            Scheme::Tcp6 => "tcp6",
            Scheme::Udp => "udp",
            Scheme::Udp4 => "udp4",
            Scheme::Udp6 => "udp6",
            Scheme::Unix => "unix",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceUri {
    pub scheme: Scheme,
    /// Host for tcp/udp; filesystem path for unix.
    pub host: String,
    pub port: u16,
}

impl FaceUri {
    /// The `host:port` string for socket APIs.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            // bare IPv6 address
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn scope(&self) -> FaceScope {
        if self.scheme == Scheme::Unix {
            return FaceScope::Local;
        }
        let is_loopback = self.host == "localhost"
            || self
                .host
                .parse::<IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false);
        if is_loopback {
            FaceScope::Local
        } else {
            FaceScope::NonLocal
        }
    }

    pub fn link_type(&self) -> LinkType {
        // stream sockets and connected datagrams both have two endpoints
        LinkType::PointToPoint
    }
}

impl FromStr for FaceUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme_str, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::Uri(format!("missing scheme in face URI '{}'", s)))?;

        let scheme = match scheme_str {
            "tcp" => Scheme::Tcp,
            "tcp4" => Scheme::Tcp4,
            "tcp6" => Scheme::Tcp6,
            "udp" => Scheme::Udp,
            "udp4" => Scheme::Udp4,
            "udp6" => Scheme::Udp6,
            "unix" => Scheme::Unix,
            other => return Err(Error::Uri(format!("unknown face URI scheme '{}'", other))),
        };

        if scheme == Scheme::Unix {
            if rest.is_empty() {
                return Err(Error::Uri(format!("empty unix path in '{}'", s)));
            }
            return Ok(FaceUri {
                scheme,
                host: rest.to_string(),
                port: 0,
            });
        }

        if rest.is_empty() {
            return Err(Error::Uri(format!("empty host in '{}'", s)));
        }

        // [v6]:port, [v6], host:port, host
        let (host, port) = if let Some(stripped) = rest.strip_prefix('[') {
            let (inner, after) = stripped
                .split_once(']')
                .ok_or_else(|| Error::Uri(format!("unterminated IPv6 literal in '{}'", s)))?;
            let port = match after.strip_prefix(':') {
                Some(p) => p
                    .parse()
                    .map_err(|_| Error::Uri(format!("bad port in '{}'", s)))?,
                None => NDN_PORT,
            };
            (inner.to_string(), port)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (
                    host.to_string(),
                    port.parse()
                        .map_err(|_| Error::Uri(format!("bad port in '{}'", s)))?,
                ),
                None => (rest.to_string(), NDN_PORT),
            }
        };

        Ok(FaceUri { scheme, host, port })
    }
}

impl fmt::Display for FaceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme == Scheme::Unix {
            write!(f, "unix://{}", self.host)
        } else if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}
