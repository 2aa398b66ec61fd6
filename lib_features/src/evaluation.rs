//! Сравнение всех сочетаний детекторов и дескрипторов на одной
//! последовательности: число точек, размер окрестности, число совпадений
//! и время работы.

use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{info, warn};
use opencv::prelude::*;
use opencv::Error;
use serde::{Deserialize, Serialize};

use crate::config::TrackingConfig;
use crate::description::{DescriptorKind, check_combination};
use crate::detection::DetectorKind;
use crate::error::FeaturesError;
use crate::matching::{MatcherKind, SelectorKind};
use crate::pipeline::{FrameReport, TrackingPipeline};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationReport {
    pub detector: DetectorKind,
    pub descriptor: DescriptorKind,
    pub frames: Vec<FrameReport>,
    pub total_keypoints: usize,
    pub total_matches: usize,
    pub mean_detection_ms: f64,
    pub mean_description_ms: f64,
    /// Заполнено, если OpenCV не смог обработать последовательность
    pub error: Option<String>,
}

impl CombinationReport {
    fn new(detector: DetectorKind, descriptor: DescriptorKind) -> Self {
        Self {
            detector,
            descriptor,
            frames: Vec::new(),
            total_keypoints: 0,
            total_matches: 0,
            mean_detection_ms: 0.0,
            mean_description_ms: 0.0,
            error: None,
        }
    }

    fn summarize(&mut self) {
        self.total_keypoints = self.frames.iter().map(|f| f.keypoints.count).sum();
        self.total_matches = self.frames.iter().filter_map(|f| f.matches).sum();
        if !self.frames.is_empty() {
            let n = self.frames.len() as f64;
            self.mean_detection_ms = self.frames.iter().map(|f| f.detection_ms).sum::<f64>() / n;
            self.mean_description_ms =
                self.frames.iter().map(|f| f.description_ms).sum::<f64>() / n;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub matcher: MatcherKind,
    pub selector: SelectorKind,
    pub frame_count: usize,
    pub combinations: Vec<CombinationReport>,
    /// Сочетания, отброшенные до запуска
    pub skipped: Vec<(DetectorKind, DescriptorKind)>,
}

impl EvaluationReport {
    /// Сочетание с наибольшим числом совпадений.
    pub fn best_by_matches(&self) -> Option<&CombinationReport> {
        self.combinations
            .iter()
            .filter(|c| c.error.is_none())
            .max_by_key(|c| c.total_matches)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), FeaturesError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| FeaturesError::io(path, source))?;
        info!("Отчёт сохранён в {}", path.display());
        Ok(())
    }
}

fn run_combination(
    config: &TrackingConfig,
    images: &[Mat],
    detector: DetectorKind,
    descriptor: DescriptorKind,
) -> Result<Vec<FrameReport>, Error> {
    let mut pipeline = TrackingPipeline::with_kinds(config, detector, descriptor)?;
    images
        .iter()
        .map(|img| pipeline.process(img.clone(), false))
        .collect()
}

/// Прогоняет уже загруженные кадры через каждое допустимое сочетание.
pub fn evaluate_images(config: &TrackingConfig, images: &[Mat]) -> EvaluationReport {
    let mut report = EvaluationReport {
        matcher: config.matcher,
        selector: config.selector,
        frame_count: images.len(),
        combinations: Vec::new(),
        skipped: Vec::new(),
    };

    for detector in DetectorKind::ALL {
        for descriptor in DescriptorKind::ALL {
            if let Err(e) = check_combination(detector, descriptor) {
                warn!("Пропуск {} + {}: {}", detector, descriptor, e.message);
                report.skipped.push((detector, descriptor));
                continue;
            }

            let stopwatch = Instant::now();
            let mut combination = CombinationReport::new(detector, descriptor);
            match run_combination(config, images, detector, descriptor) {
                Ok(frames) => combination.frames = frames,
                Err(e) => {
                    warn!("{} + {} завершилось ошибкой: {:?}", detector, descriptor, e);
                    combination.error = Some(e.message);
                }
            }
            combination.summarize();
            info!(
                "{} + {}: {} точек, {} совпадений за {:?}",
                detector,
                descriptor,
                combination.total_keypoints,
                combination.total_matches,
                stopwatch.elapsed()
            );
            report.combinations.push(combination);
        }
    }
    report
}

/// Загружает последовательность из конфигурации и оценивает все сочетания.
pub fn evaluate_all(config: &TrackingConfig) -> Result<EvaluationReport, Error> {
    let images = (0..config.sequence.len())
        .map(|offset| config.sequence.load_gray(offset))
        .collect::<Result<Vec<Mat>, Error>>()?;
    info!("Загружено {} кадров для оценки", images.len());
    Ok(evaluate_images(config, &images))
}
