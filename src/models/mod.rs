//! Data models for the notification feed.
//!
//! Field names match the store's record shape and the frontend's Notification interface.

mod feed;
mod notification;

pub use feed::*;
pub use notification::*;
