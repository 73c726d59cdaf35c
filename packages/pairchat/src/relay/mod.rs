//! One-to-one chat relay
//!
//! One WebSocket connection per client that:
//! - Binds to a (sender, receiver) identity pair on its first event
//! - Replays the pair's stored history to the newly bound client
//! - Persists each new message, echoes it to the sender, and forwards it
//!   to the receiver's live connection when one is registered

mod handler;
mod protocol;
mod registry;
mod session;

// Re-export the main types and functions
pub use handler::handle_relay_ws;
pub use registry::SessionRegistry;
pub(crate) use session::RelaySession;
