//! Terminal front end for the installer binary.
//!
//! The library never renders anything itself; this module is one consumer of
//! the event channel.

pub mod console;
pub mod password;
