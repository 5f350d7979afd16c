//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{is_supported_document, read_file_limited, sanitize_filename};
pub use retry::{RetryPolicy, Retryable};
pub use text::{preview, truncate_with_ellipsis};
