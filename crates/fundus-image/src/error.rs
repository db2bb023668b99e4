/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when two images are expected to share the same size.
    #[error("Image size mismatch: {0}x{1} vs {2}x{3}")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when a crop region does not fit inside the source image.
    #[error("Crop region at ({0}, {1}) with size {2}x{3} exceeds the image bounds ({4}x{5})")]
    InvalidCropRegion(usize, usize, usize, usize, usize, usize),

    /// Error when an operation does not support the number of channels.
    #[error("Unsupported number of channels: {0}")]
    UnsupportedChannels(usize),

    /// Error reported by the resize backend.
    #[error("Failed to resize the image: {0}")]
    ResizeError(String),

    /// Error when an operation requires a non-empty image.
    #[error("Image has zero width or height")]
    EmptyImage,
}
