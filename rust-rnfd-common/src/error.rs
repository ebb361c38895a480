//! Error types for the rNFD implementation.

use thiserror::Error;

/// All possible errors that can occur within the rNFD implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to NDN packet processing.
    #[error("NDN packet error: {0}")]
    Packet(String),

    /// A name component carries a TLV type outside the valid range.
    #[error("TLV-TYPE {0} is not a valid NameComponent")]
    InvalidComponent(u64),

    /// Error parsing a name or face URI.
    #[error("URI error: {0}")]
    Uri(String),

    /// A strategy instance name carries a version the strategy does not accept.
    #[error("{strategy} does not support version {version}")]
    InvalidStrategyVersion { strategy: String, version: u64 },

    /// A strategy name is not present in the registry.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Unknown management noun/verb pair.
    #[error("no such command: {0}")]
    NoSuchCommand(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The token generator could not find a free PIT token.
    #[error("PIT token space exhausted after {0} attempts")]
    TokenExhausted(u32),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
