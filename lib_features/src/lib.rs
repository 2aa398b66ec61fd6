//! Обвязка над детекторами, дескрипторами и сопоставителями OpenCV для
//! отслеживания ключевых точек между кадрами.

pub mod config;
pub mod description;
pub mod detection;
pub mod error;
pub mod evaluation;
pub mod frame;
pub mod keypoints;
pub mod matching;
pub mod params;
pub mod pipeline;
pub mod sequence;
pub mod visualization;

pub use config::{RunMode, TrackingConfig};
pub use error::FeaturesError;
