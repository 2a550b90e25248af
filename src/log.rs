//! This is a helper module which reexports all logging macros from the `log`
//! crate. This means that you can simply say:
//!
//! ```ignore
//! use crate::log::*;
//! ```
//!
//! To import all logging macros.
//!
//! The core itself never installs a logger. Hosts that want to see these
//! messages (including the `serial` target used for guest console output)
//! pick whatever `log` backend they like.

pub use log::{log, trace, debug, info, warn, error};
