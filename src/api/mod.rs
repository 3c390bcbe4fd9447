//! HTTP handlers for the shop backend.
//!
//! Each configured route becomes an [`ActionHandler`](crate::queue::ActionHandler)
//! that POSTs the action payload as JSON.

mod client;

pub use client::{register_http_handlers, HttpActionHandler};
