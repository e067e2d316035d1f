pub mod controller;
pub mod detector;
mod loop_worker;

pub use controller::SensingController;
pub use detector::{parse_presence_token, FaceDetector, FlagFileDetector, PresenceSample};
