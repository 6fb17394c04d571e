//! Ordered indexes over keyed items.

mod skip_list;

pub use skip_list::*;

/// Which way to walk from a starting id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards increasing ids.
    Forward,
    /// Towards decreasing ids.
    Backward,
}
