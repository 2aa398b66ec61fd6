use std::time::Instant;

use log::{debug, info};
use opencv::Error;
use opencv::core::StsBadArg;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TrackingConfig;
use crate::description::{DescriptorKind, check_combination, describe_keypoints};
use crate::detection::{DetectorKind, detect_keypoints};
use crate::frame::{DataFrame, FrameBuffer};
use crate::keypoints::{KeypointStats, limit_keypoints, retain_in_rect};
use crate::matching::match_descriptors;
use crate::visualization::show_matches;

/// Итог обработки одного кадра.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: usize,
    pub keypoints: KeypointStats,
    /// `None` для первого кадра, сопоставлять ещё не с чем
    pub matches: Option<usize>,
    pub detection_ms: f64,
    pub description_ms: f64,
    pub matching_ms: Option<f64>,
}

/// Обрабатывает кадры по одному: детектирование, описание и сопоставление
/// с предыдущим кадром из буфера.
pub struct TrackingPipeline<'a> {
    config: &'a TrackingConfig,
    detector: DetectorKind,
    descriptor: DescriptorKind,
    buffer: FrameBuffer,
    frames_seen: usize,
}

impl<'a> TrackingPipeline<'a> {
    pub fn new(config: &'a TrackingConfig) -> Result<Self, Error> {
        Self::with_kinds(config, config.detector, config.descriptor)
    }

    /// Конвейер с детектором и дескриптором, отличными от указанных в конфигурации.
    pub fn with_kinds(
        config: &'a TrackingConfig,
        detector: DetectorKind,
        descriptor: DescriptorKind,
    ) -> Result<Self, Error> {
        check_combination(detector, descriptor)?;
        config.matching.validate(config.selector)?;
        if config.buffer_size < 2 {
            return Err(Error::new(
                StsBadArg as i32,
                format!(
                    "Для сопоставления в буфере нужно хотя бы 2 кадра, задано {}",
                    config.buffer_size
                ),
            ));
        }
        Ok(Self {
            config,
            detector,
            descriptor,
            buffer: FrameBuffer::new(config.buffer_size),
            frames_seen: 0,
        })
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn process(&mut self, image: Mat, visualize: bool) -> Result<FrameReport, Error> {
        let config = self.config;
        let frame_index = self.frames_seen;
        self.frames_seen += 1;

        let mut frame = DataFrame::new(image);

        let stopwatch = Instant::now();
        let mut keypoints = detect_keypoints(
            &frame.image,
            self.detector,
            &config.features,
            visualize && config.visualize_keypoints,
        )?;
        let detection_ms = stopwatch.elapsed().as_secs_f64() * 1000.0;

        if config.focus_on_vehicle {
            let before = keypoints.len();
            keypoints = retain_in_rect(&keypoints, config.focus_rect);
            debug!(
                "В области интереса осталось {} из {} точек",
                keypoints.len(),
                before
            );
        }
        if let Some(max_keypoints) = config.max_keypoints {
            limit_keypoints(&mut keypoints, max_keypoints, self.detector)?;
            debug!("Число точек ограничено до {}", keypoints.len());
        }

        let stopwatch = Instant::now();
        frame.descriptors = describe_keypoints(
            &mut keypoints,
            &frame.image,
            self.descriptor,
            &config.features,
        )?;
        let description_ms = stopwatch.elapsed().as_secs_f64() * 1000.0;

        let stats = KeypointStats::from_keypoints(&keypoints);
        frame.keypoints = keypoints;
        self.buffer.push(frame);

        let (Some(previous), Some(current)) = (self.buffer.previous(), self.buffer.current())
        else {
            return Ok(FrameReport {
                frame: frame_index,
                keypoints: stats,
                matches: None,
                detection_ms,
                description_ms,
                matching_ms: None,
            });
        };

        let stopwatch = Instant::now();
        let matches = match_descriptors(
            &previous.descriptors,
            &current.descriptors,
            self.descriptor.family(),
            config.matcher,
            config.selector,
            &config.matching,
        )?;
        let matching_ms = stopwatch.elapsed().as_secs_f64() * 1000.0;

        if visualize && config.visualize_matches {
            show_matches(
                &previous.image,
                &previous.keypoints,
                &current.image,
                &current.keypoints,
                &matches,
                "Matching keypoints between two camera images",
            )?;
        }

        let match_count = matches.len();
        if let Some(current) = self.buffer.current_mut() {
            current.matches = matches;
        }

        Ok(FrameReport {
            frame: frame_index,
            keypoints: stats,
            matches: Some(match_count),
            detection_ms,
            description_ms,
            matching_ms: Some(matching_ms),
        })
    }
}

/// Прогоняет всю последовательность выбранными в конфигурации алгоритмами.
pub fn run_tracking(config: &TrackingConfig) -> Result<Vec<FrameReport>, Error> {
    info!(
        "Детектор {}, дескриптор {}, {} + {}",
        config.detector, config.descriptor, config.matcher, config.selector
    );
    let mut pipeline = TrackingPipeline::new(config)?;
    let mut reports = Vec::with_capacity(config.sequence.len());
    for offset in 0..config.sequence.len() {
        let image = config.sequence.load_gray(offset)?;
        let report = pipeline.process(image, true)?;
        match report.matches {
            Some(matches) => info!(
                "Кадр {}: {} точек, {} совпадений",
                report.frame, report.keypoints.count, matches
            ),
            None => info!("Кадр {}: {} точек", report.frame, report.keypoints.count),
        }
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{MatcherKind, SelectorKind};
    use crate::test_utils::square_grid;

    fn test_config() -> TrackingConfig {
        TrackingConfig {
            detector: DetectorKind::Fast,
            descriptor: DescriptorKind::Brisk,
            matcher: MatcherKind::BruteForce,
            selector: SelectorKind::NearestNeighbour,
            focus_on_vehicle: false,
            visualize_keypoints: false,
            visualize_matches: false,
            ..Default::default()
        }
    }

    #[test]
    fn first_frame_has_nothing_to_match() {
        let config = test_config();
        let mut pipeline = TrackingPipeline::new(&config).unwrap();
        let report = pipeline
            .process(square_grid(200, 200, 25).unwrap(), false)
            .unwrap();

        assert_eq!(report.frame, 0);
        assert!(report.matches.is_none());
        assert!(report.matching_ms.is_none());
        assert_eq!(pipeline.buffer().len(), 1);
    }

    #[test]
    fn identical_frames_are_matched() {
        let config = test_config();
        let mut pipeline = TrackingPipeline::new(&config).unwrap();
        pipeline
            .process(square_grid(200, 200, 25).unwrap(), false)
            .unwrap();
        let report = pipeline
            .process(square_grid(200, 200, 25).unwrap(), false)
            .unwrap();

        assert_eq!(report.frame, 1);
        let current = pipeline.buffer().current().unwrap();
        assert_eq!(report.matches, Some(current.matches.len()));
        assert_eq!(current.descriptors.rows() as usize, current.keypoints.len());
    }

    #[test]
    fn buffer_never_exceeds_capacity() {
        let config = test_config();
        let mut pipeline = TrackingPipeline::new(&config).unwrap();
        for _ in 0..4 {
            pipeline
                .process(square_grid(120, 120, 20).unwrap(), false)
                .unwrap();
        }
        assert_eq!(pipeline.buffer().len(), 2);
    }

    #[test]
    fn keypoint_limit_is_applied() {
        let config = TrackingConfig {
            max_keypoints: Some(5),
            ..test_config()
        };
        let mut pipeline = TrackingPipeline::new(&config).unwrap();
        let report = pipeline
            .process(square_grid(200, 200, 25).unwrap(), false)
            .unwrap();
        assert!(report.keypoints.count <= 5);
    }

    #[test]
    fn focus_box_outside_image_leaves_no_keypoints() {
        let config = TrackingConfig {
            focus_on_vehicle: true,
            ..test_config()
        };
        let mut pipeline = TrackingPipeline::new(&config).unwrap();
        pipeline
            .process(square_grid(100, 100, 20).unwrap(), false)
            .unwrap();
        let report = pipeline
            .process(square_grid(100, 100, 20).unwrap(), false)
            .unwrap();

        assert_eq!(report.keypoints.count, 0);
        assert_eq!(report.matches, Some(0));
    }

    #[test]
    fn single_frame_buffer_is_refused() {
        let config = TrackingConfig {
            buffer_size: 1,
            ..test_config()
        };
        let err = TrackingPipeline::new(&config).err().unwrap();
        assert_eq!(err.code, StsBadArg as i32);
    }

    #[test]
    fn knn_with_one_neighbour_is_refused_up_front() {
        let config = TrackingConfig {
            selector: SelectorKind::KNearestNeighbours,
            matching: crate::matching::MatchingParams {
                k: 1,
                ..Default::default()
            },
            ..test_config()
        };
        assert!(TrackingPipeline::new(&config).is_err());
    }

    #[test]
    fn incompatible_combination_is_refused_up_front() {
        let config = TrackingConfig {
            detector: DetectorKind::Sift,
            descriptor: DescriptorKind::Orb,
            ..test_config()
        };
        assert!(TrackingPipeline::new(&config).is_err());
    }
}
