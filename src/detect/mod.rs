//! Motion detection against a static reference frame.
//!
//! - `preprocess`: resize, mirror, grayscale, blur
//! - `background`: the reference frame and its (optional) refresh policy
//! - `pipeline`: diff, threshold, dilate, contours, best-contour selection
//! - `contour`: contour geometry
//! - `annotate`: overlay drawn on the streamed frame

pub mod annotate;
pub mod background;
pub mod contour;
pub mod pipeline;
pub mod preprocess;

pub use annotate::annotate_motion;
pub use background::BackgroundModel;
pub use contour::SelectedContour;
pub use pipeline::MotionPipeline;
pub use preprocess::FramePreprocessor;
