#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for I/O operations.
///
/// Defines [`IoError`](error::IoError) variants for file access and
/// encoding/decoding failures.
pub mod error;

/// High-level image reading functions.
///
/// Decodes any format supported by the `image` crate into rgb8 or mono8.
/// See [`functional::read_image_any_rgb8`].
pub mod functional;

/// PNG image encoding.
///
/// Write rgb8 and gray8 images as PNG files.
pub mod png;

pub use crate::error::IoError;
