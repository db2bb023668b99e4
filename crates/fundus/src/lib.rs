#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use fundus_image as image;

#[doc(inline)]
pub use fundus_imgproc as imgproc;

#[doc(inline)]
pub use fundus_io as io;

#[doc(inline)]
pub use fundus_segment as segment;
