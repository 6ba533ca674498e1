//! Two-way reconciliation between the local replica store and the remote
//! notes table.
//!
//! A [`SyncEngine`] owns one session: it runs reconciliation passes, applies
//! realtime change events, and commits conflict decisions through its
//! [`ConflictResolver`]. Observers follow progress through the engine's
//! [`StatusNotifier`].

mod engine;
mod feed;
mod resolve;
mod status;

pub use engine::{SyncEngine, SyncOutcome};
pub use feed::ChangeEvent;
pub use resolve::{ConflictDecision, ConflictResolver, ResolutionChoice};
pub use status::{StatusNotifier, Subscription, SyncStatus};
