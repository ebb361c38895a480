//! Common NDN types and utilities for the rNFD forwarder.

pub mod error;
pub mod metrics;
pub mod name;
pub mod packet;
pub mod tlv;
pub mod types;

pub use error::Error;
pub use name::{Name, NameComponent, NamingContext};
pub use packet::{Data, Interest, Nack, NackReason, Packet};
pub use types::{FaceId, FaceScope, LinkType, INVALID_FACE_ID};
