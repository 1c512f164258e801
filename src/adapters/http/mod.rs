//! HTTP adapters.
//!
//! Only the webhook endpoint lives here: the rest of the HTTP surface
//! (checkout pages, team management) is outside this core and calls the
//! application handlers directly.

pub mod webhook;
