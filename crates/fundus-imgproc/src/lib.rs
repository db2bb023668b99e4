#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image basic operations module.
pub mod core;

/// image cropping module.
pub mod crop;

/// drawing and painting utilities.
pub mod draw;

/// module containing parallization utilities.
pub mod parallel;

/// utility functions for resizing images.
pub mod resize;

/// operations to threshold images.
pub mod threshold;
