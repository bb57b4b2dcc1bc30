mod clock;
pub use clock::*;
mod mac;
pub use mac::*;
mod vlan;
pub use vlan::*;
mod entry;
pub use entry::{EntryId, EntryState, LearnedEntry};
mod list;
mod port_tracker;
pub use port_tracker::PortUsage;
mod eviction;
mod table;
pub use table::*;
mod shared;
pub use shared::*;
mod config;
pub use config::*;
mod runtime;
pub use runtime::*;
