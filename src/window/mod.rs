//! A sliding window over a [`DataSource`](crate::source::DataSource), kept in
//! a ring together with prefetched buffers on either side.
//!
//! ```text
//!   ... | lower buffer | window | upper buffer | spare | ...
//!        <- older ids                 newer ids ->
//! ```
//!
//! The window moves one slot at a time without touching the source as long as
//! the buffer in the direction of travel is not empty. Buffers below half
//! capacity are refilled in the background, one fill per side at a time.

mod cache;
mod config;
mod ring;

pub use cache::*;
pub use config::*;
pub use ring::*;
