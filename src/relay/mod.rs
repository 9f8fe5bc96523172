//! Relay module
//!
//! Everything that owns shared game state:
//! - `registry` - session id to last known player transform
//! - `chat` - bounded chat history for replay
//! - `dispatch` - event handlers producing outbound deliveries
//! - `actor` - the task that owns the relay and fans deliveries out

pub mod actor;
pub mod chat;
pub mod dispatch;
pub mod registry;

pub use actor::{RelayActor, RelayCommand, RelayHandle, RelayStatus};
pub use chat::ChatHistory;
pub use dispatch::{Delivery, Relay, RelaySettings, Target};
pub use registry::SessionRegistry;
