//! Utility modules

pub mod image;
pub mod nms;

pub use self::image::ImageUtils;
pub use self::nms::OverlapResolver;
