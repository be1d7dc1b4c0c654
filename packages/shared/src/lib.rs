//! Shared utilities for the CRM live packages.

pub mod logger;
pub mod time;
