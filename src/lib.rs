//! Velvet Rope - Entitlement core for creator spaces
//!
//! Answers two questions correctly under all failure conditions: does
//! this user currently have the right to view this resource, and when
//! money changes hands, is exactly one durable access grant produced per
//! successful payment.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
