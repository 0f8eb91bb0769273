//! Contract types shared by every layer
//!
//! - [`Epoch`]: ordering marker for invalidation and commits
//! - [`Timestamp`]: wall-clock time, used for fetch times

pub mod epoch;
pub mod timestamp;

pub use epoch::Epoch;
pub use timestamp::Timestamp;
