//! Reference stage variants. Each wraps one small operation behind the `Stage`
//! capability; the engine never depends on any of them directly.

pub mod capture;
pub mod convert_color;
pub mod image_write;
pub mod recall;
pub mod threshold;

pub use capture::{Capture, FileSource, ImageSource, StaticSource};
pub use convert_color::ConvertColor;
pub use image_write::ImageWrite;
pub use recall::Recall;
pub use threshold::Threshold;
