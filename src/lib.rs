//! Gatekeep - in-process rate limiting
//!
//! This crate implements fixed-window admission control for the review
//! collection service. Each concern (dashboard, public widget, AI generation,
//! review submission) gets its own limiter with a bounded key store, so a
//! flood of spoofed client identities cannot grow memory without limit.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod telemetry;
