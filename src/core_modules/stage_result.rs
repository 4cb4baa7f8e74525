// THEORY:
// A `StageResult` is the "dumb" data container a stage hands back to the
// pipeline. It carries an optional image, the tag saying how that image's
// channels are to be read, and an optional secondary model (contours,
// candidate locations, match scores...) that a stage may attach instead of,
// or alongside, the image.
//
// Key architectural principles:
// 1.  **Absence is not a value of this type**: a result with neither an image
//     nor a model cannot be constructed. Stages express "nothing produced"
//     as `Option::None`, so callers can never confuse "nothing happened" with
//     "something happened with empty content."
// 2.  **Immutable once published**: the pipeline stores results behind an
//     `Arc`. Any stage that wants to work on a cached image must take its own
//     copy (see the `Recall` stage), so a cached result can never be corrupted
//     by a later consumer.
// 3.  **Opaque models**: the engine never looks inside a model. It is shared
//     type-erased and stages downcast to the concrete type they expect.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Describes how the channels of an image are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Rgba,
    Bgr,
    Bgra,
    Hsv,
}

impl ColorSpace {
    /// Infers the natural tag for a freshly decoded or captured image.
    pub fn of(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLumaA16(_) => ColorSpace::Gray,
            DynamicImage::ImageRgba8(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageRgba32F(_) => ColorSpace::Rgba,
            _ => ColorSpace::Rgb,
        }
    }
}

/// Type-erased secondary payload attached to a result.
#[derive(Clone)]
pub struct Model(Arc<dyn Any + Send + Sync>);

impl Model {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrows the payload as `T`, or `None` if it holds something else.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Model(..)")
    }
}

/// The output of one stage execution.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// The pixel data produced by the stage, if any.
    image: Option<DynamicImage>,
    /// How the channels of `image` are to be read. Meaningless without an image.
    color_space: ColorSpace,
    /// Stage-specific structured data.
    model: Option<Model>,
}

impl StageResult {
    /// A result carrying an image.
    pub fn with_image(image: DynamicImage, color_space: ColorSpace) -> Self {
        Self {
            image: Some(image),
            color_space,
            model: None,
        }
    }

    /// A result carrying only a model.
    pub fn with_model(model: Model) -> Self {
        Self {
            image: None,
            color_space: ColorSpace::Gray,
            model: Some(model),
        }
    }

    /// Builds a result from optional parts. Returns `None` when both the image
    /// and the model are absent.
    pub fn from_parts(
        image: Option<DynamicImage>,
        color_space: ColorSpace,
        model: Option<Model>,
    ) -> Option<Self> {
        if image.is_none() && model.is_none() {
            return None;
        }
        Some(Self {
            image,
            color_space,
            model,
        })
    }

    /// Attaches a model to an image result.
    pub fn and_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Convenience for `self.model()?.downcast_ref::<T>()`.
    pub fn model_as<T: Any>(&self) -> Option<&T> {
        self.model.as_ref()?.downcast_ref::<T>()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}
