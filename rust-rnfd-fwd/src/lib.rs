//! rNFD forwarding core: tables, pipelines, strategies, and the timer
//! scheduler, all driven from a single event loop.

pub mod config;
pub mod face;
pub mod fw;
pub mod mgmt;
pub mod scheduler;
pub mod tables;

pub use config::RnfdConfig;
pub use face::{Face, FaceTable};
pub use fw::{Forwarder, ForwarderOptions, UnsolicitedDataPolicy};
