//! Forwarder tables: NameTree, FIB, PIT, PIT-assist, CS, Dead-Nonce List.

pub mod cs;
pub mod dead_nonce_list;
pub mod fib;
pub mod name_tree;
pub mod pit;
pub mod pit_assist;

pub use cs::Cs;
pub use dead_nonce_list::DeadNonceList;
pub use fib::{Fib, FibEntry, NextHop};
pub use name_tree::{NameTree, NodeId};
pub use pit::{Pit, PitEntry, PitEntryId};
pub use pit_assist::PitAssist;
