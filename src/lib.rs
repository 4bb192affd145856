//! ptrap: remote process-control server.
//!
//! Accepts controller connections over TCP and serves process memory
//! access, memory scanning and a single-target debug session.

pub mod actor;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod server;

pub use actor::SessionHandle;
pub use error::ServerError;
pub use server::Server;
