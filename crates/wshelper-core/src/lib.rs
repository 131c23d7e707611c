//! # wshelper-core
//!
//! Core crate for wshelper. Contains the configuration schemas and the
//! unified error system shared by the session engine and the demo server.
//!
//! This crate has **no** internal dependencies on other wshelper crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::{BoxError, ErrorKind, WsError};
pub use result::WsResult;
