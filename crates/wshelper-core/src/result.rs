//! Convenience result type alias for wshelper.

use crate::error::WsError;

/// A specialized `Result` type for wshelper operations.
pub type WsResult<T> = Result<T, WsError>;
