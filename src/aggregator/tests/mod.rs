//! Test suites for the correlation engine
//!
//! Suites are organized by behaviour: inline aggregation, group timeouts,
//! resequencing, expiry sweeps and concurrent use.

mod expiry;
mod support;
