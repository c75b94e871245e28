//! Shared types for the attestation lifecycle.
//!
//! Every crate in the workspace speaks in these types: the artifacts handed
//! from one lifecycle stage to the next, the Solidity bindings of the
//! contracts involved, and the events published while a run advances.

pub mod account;
pub mod attestation;
pub mod contracts;
pub mod events;
pub mod lifecycle;
pub mod proof;
pub mod submission;
pub mod transfer;
pub mod utils;

pub use account::*;
pub use attestation::*;
pub use events::*;
pub use lifecycle::*;
pub use proof::*;
pub use submission::*;
pub use transfer::*;
