//! Region RTT Monitor Library
//!
//! Exposes the probing and aggregation core for use by binaries and tests.

pub mod rtt_monitor;
