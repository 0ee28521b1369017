//! Common utilities and types shared across SealBox crates.
//!
//! This crate provides the error taxonomy, cooperative cancellation
//! signals and the cancellable copy loop that every pipeline runs on.

pub mod cancel;
pub mod error;
pub mod io;
pub mod types;

pub use cancel::{CancelSignal, Deadline, Never};
pub use error::{Error, Result};
pub use io::{copy_with_cancel, COPY_BUFFER_SIZE};
pub use types::SensitiveBytes;

pub use tokio_util::sync::CancellationToken;
