//! ptrap-scan: memory scan engine.
//!
//! A scan decodes a [`ScanQuery`] from the controller's payload, walks
//! every readable region of the target through a
//! [`ptrap_platform::ProcessControl`] backend and collects the
//! addresses whose contents satisfy the chosen [`CompareOp`].

pub mod compare;
pub mod engine;
pub mod error;
pub mod matches;
pub mod value;

pub use compare::CompareOp;
pub use engine::{ScanOutcome, Scanner, DEFAULT_PAGE_SIZE};
pub use error::ScanError;
pub use matches::{MatchList, MATCH_GROWTH};
pub use value::{ScanQuery, ValueType};
