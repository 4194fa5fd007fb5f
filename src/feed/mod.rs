//! Notification feed: the subscription manager and the read-state updater.
//!
//! The feed never patches its own state. Writes go to the store and become
//! visible only when the store pushes the resulting snapshot back.

mod materialize;
mod subscription;
mod updater;

#[cfg(test)]
pub(crate) mod testing;

pub use subscription::*;
pub use updater::*;
