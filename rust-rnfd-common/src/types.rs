//! Common types shared between the forwarder core, transport, and CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub u64);

/// The reserved id of a face that does not exist.
pub const INVALID_FACE_ID: FaceId = FaceId(0);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face{}", self.0)
    }
}

/// Whether a face is attached to the local host or reaches another node.
///
/// Local faces are exempt from `/localhost` scope control and from the
/// HopLimit-zero egress drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaceScope {
    Local,
    NonLocal,
}

/// Link type of the underlying communication channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkType {
    /// Exactly two endpoints (stream sockets, connected datagrams).
    PointToPoint,
    /// Shared medium with more than two endpoints.
    MultiAccess,
    /// Wireless ad hoc link; Data may be returned on the ingress face.
    AdHoc,
}

impl fmt::Display for FaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceScope::Local => write!(f, "local"),
            FaceScope::NonLocal => write!(f, "non-local"),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::PointToPoint => write!(f, "point-to-point"),
            LinkType::MultiAccess => write!(f, "multi-access"),
            LinkType::AdHoc => write!(f, "ad-hoc"),
        }
    }
}
