//! An in-memory key-value [Store], and a [ListenableStore] whose keys
//! can be subscribed to with listeners that are notified every time
//! the value at the key changes.

pub mod cell;
mod listenable;
mod listener;
pub mod middleware;
mod registry;
mod store;

pub use listenable::{Listenable, ListenableStore, ListenerPolicy, Unsubscribe};
pub use listener::*;
pub use registry::{InstanceId, Registry};
pub use store::{Db, Store};
