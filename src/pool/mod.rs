//! Batch hand-off between a producer and parallel worker threads.

pub mod striped;

pub use striped::{CloseOnDrop, StripeGuard, StripedRecordPool};
