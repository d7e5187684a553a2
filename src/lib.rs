//! binwrap library
//!
//! Resolves, downloads, unpacks, and runs a platform-specific prebuilt
//! binary, caching it under a destination directory so later runs skip the
//! network.

pub mod commands;
pub mod core;
pub mod error;
pub mod utils;

pub use crate::core::acquire::Acquisition;
pub use crate::core::config::{Source, WrapperConfig};
pub use crate::core::platform::Platform;
pub use crate::core::runner::ProcessHandle;
pub use crate::core::wrapper::BinWrapper;
pub use crate::error::{BinwrapError, Result};
