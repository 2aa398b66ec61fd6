//! Конфигурация запуска: какие детектор, дескриптор и сопоставитель
//! использовать, где лежат кадры и что показывать.
//!
//! Файл конфигурации - JSON. Отсутствующие поля берутся из `Default`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::description::DescriptorKind;
use crate::detection::DetectorKind;
use crate::error::FeaturesError;
use crate::keypoints::FocusRect;
use crate::matching::{MatcherKind, MatchingParams, SelectorKind};
use crate::params::FeatureParams;
use crate::sequence::ImageSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Отслеживание по последовательности одним набором алгоритмов
    #[default]
    Track,
    /// Перебор всех сочетаний детекторов и дескрипторов
    Evaluate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: RunMode,
    pub sequence: ImageSequence,
    /// Число кадров в кольцевом буфере
    pub buffer_size: usize,
    pub detector: DetectorKind,
    pub descriptor: DescriptorKind,
    pub matcher: MatcherKind,
    pub selector: SelectorKind,
    pub matching: MatchingParams,
    /// Оставлять только точки на впереди идущей машине
    pub focus_on_vehicle: bool,
    pub focus_rect: FocusRect,
    /// Ограничение числа точек, для отладки
    pub max_keypoints: Option<usize>,
    pub visualize_keypoints: bool,
    pub visualize_matches: bool,
    pub features: FeatureParams,
    pub report_path: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Track,
            sequence: ImageSequence::default(),
            buffer_size: 2,
            detector: DetectorKind::ShiTomasi,
            descriptor: DescriptorKind::Brisk,
            matcher: MatcherKind::BruteForce,
            selector: SelectorKind::NearestNeighbour,
            matching: MatchingParams::default(),
            focus_on_vehicle: true,
            focus_rect: FocusRect::default(),
            max_keypoints: None,
            visualize_keypoints: false,
            visualize_matches: true,
            features: FeatureParams::default(),
            report_path: PathBuf::from("evaluation_report.json"),
        }
    }
}

impl TrackingConfig {
    pub fn from_json(json: &str) -> Result<Self, FeaturesError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, FeaturesError> {
        let json = fs::read_to_string(path).map_err(|source| FeaturesError::io(path, source))?;
        Self::from_json(&json)
    }
}
