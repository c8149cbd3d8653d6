//! Shared helpers: log file setup, drop guards and home-relative paths.

pub mod context;
pub mod logger;
pub mod paths;
