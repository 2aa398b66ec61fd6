use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use log::info;
use opencv::core::{KeyPoint, Point2f, StsBadArg, Vector};
use opencv::features2d::{
    AKAZE, AKAZE_DescriptorType, BRISK, FastFeatureDetector, FastFeatureDetector_DetectorType,
    KAZE_DiffusivityType, ORB, SIFT,
};
use opencv::imgproc::{corner_harris, good_features_to_track};
use opencv::prelude::*;
use opencv::{Error, core};
use serde::{Deserialize, Serialize};

use crate::params::{FeatureParams, HarrisParams, ShiTomasiParams};
use crate::visualization::{show_harris_response, show_keypoints};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorKind {
    #[serde(rename = "SHITOMASI")]
    ShiTomasi,
    #[serde(rename = "HARRIS")]
    Harris,
    #[serde(rename = "FAST")]
    Fast,
    #[serde(rename = "BRISK")]
    Brisk,
    #[serde(rename = "ORB")]
    Orb,
    #[serde(rename = "AKAZE")]
    Akaze,
    #[serde(rename = "SIFT")]
    Sift,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 7] = [
        DetectorKind::ShiTomasi,
        DetectorKind::Harris,
        DetectorKind::Fast,
        DetectorKind::Brisk,
        DetectorKind::Orb,
        DetectorKind::Akaze,
        DetectorKind::Sift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::ShiTomasi => "SHITOMASI",
            DetectorKind::Harris => "HARRIS",
            DetectorKind::Fast => "FAST",
            DetectorKind::Brisk => "BRISK",
            DetectorKind::Orb => "ORB",
            DetectorKind::Akaze => "AKAZE",
            DetectorKind::Sift => "SIFT",
        }
    }

    /// Заголовок окна отладки.
    fn window_name(&self) -> String {
        match self {
            DetectorKind::ShiTomasi => "Shi-Tomasi Corner Detector Results".to_string(),
            DetectorKind::Harris => "Harris Corner Detector Results".to_string(),
            other => format!("{} Detector Results", other.name()),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectorKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::new(
                    StsBadArg as i32,
                    format!("Неизвестный тип детектора: {}", s),
                )
            })
    }
}

/// Классический детектор Ши-Томаси на основе `good_features_to_track`.
pub fn detect_keypoints_shi_tomasi(
    img: &Mat,
    params: &ShiTomasiParams,
    visualize: bool,
) -> Result<Vector<KeyPoint>, Error> {
    let min_distance = params.min_distance();
    let max_corners = params.max_corners(img.rows(), img.cols());

    let stopwatch = Instant::now();
    let mut corners = Vector::<Point2f>::new();
    good_features_to_track(
        img,
        &mut corners,
        max_corners,
        params.quality_level,
        min_distance,
        &Mat::default(),
        params.block_size,
        false,
        params.k,
    )?;

    let mut keypoints = Vector::<KeyPoint>::with_capacity(corners.len());
    for corner in corners.iter() {
        keypoints.push(KeyPoint::new_coords(
            corner.x,
            corner.y,
            params.block_size as f32,
            -1.0,
            0.0,
            0,
            -1,
        )?);
    }
    info!(
        "Shi-Tomasi: найдено {} ключевых точек за {:?}",
        keypoints.len(),
        stopwatch.elapsed()
    );

    if visualize {
        show_keypoints(img, &keypoints, &DetectorKind::ShiTomasi.window_name())?;
    }
    Ok(keypoints)
}

/// Отклик Харриса, нормированный в [0, 255] (CV_32FC1).
pub fn harris_response(img: &Mat, params: &HarrisParams) -> Result<Mat, Error> {
    let mut corners = Mat::default();
    corner_harris(
        img,
        &mut corners,
        params.block_size,
        params.aperture_size,
        params.k,
        core::BORDER_DEFAULT,
    )?;
    let mut corners_norm = Mat::default();
    core::normalize(
        &corners,
        &mut corners_norm,
        0.0,
        255.0,
        core::NORM_MINMAX,
        core::CV_32FC1,
        &Mat::default(),
    )?;
    Ok(corners_norm)
}

/// Точки из нормированного отклика Харриса: каждый пиксель выше порога.
/// Подавление немаксимумов не выполняется.
pub fn keypoints_from_harris_response(
    corners_norm: &Mat,
    params: &HarrisParams,
) -> Result<Vector<KeyPoint>, Error> {
    let mut keypoints = Vector::<KeyPoint>::new();
    for row in 0..corners_norm.rows() {
        for col in 0..corners_norm.cols() {
            let response = *corners_norm.at_2d::<f32>(row, col)? as i32;
            if response > params.min_response {
                keypoints.push(KeyPoint::new_coords(
                    col as f32,
                    row as f32,
                    (2 * params.aperture_size) as f32,
                    -1.0,
                    response as f32,
                    0,
                    -1,
                )?);
            }
        }
    }
    Ok(keypoints)
}

pub fn detect_keypoints_harris(
    img: &Mat,
    params: &HarrisParams,
    visualize: bool,
) -> Result<Vector<KeyPoint>, Error> {
    let stopwatch = Instant::now();
    let corners_norm = harris_response(img, params)?;
    let keypoints = keypoints_from_harris_response(&corners_norm, params)?;
    info!(
        "Harris: найдено {} ключевых точек за {:?}",
        keypoints.len(),
        stopwatch.elapsed()
    );

    if visualize {
        show_harris_response(
            &corners_norm,
            &keypoints,
            &DetectorKind::Harris.window_name(),
        )?;
    }
    Ok(keypoints)
}

/// Детекторы из features2d: FAST, BRISK, ORB, AKAZE, SIFT.
pub fn detect_keypoints_modern(
    img: &Mat,
    kind: DetectorKind,
    params: &FeatureParams,
    visualize: bool,
) -> Result<Vector<KeyPoint>, Error> {
    let mut keypoints = Vector::<KeyPoint>::new();

    let stopwatch = Instant::now();
    match kind {
        DetectorKind::Fast => {
            let mut detector = FastFeatureDetector::create(
                params.fast.threshold,
                params.fast.nonmax_suppression,
                FastFeatureDetector_DetectorType::TYPE_9_16,
            )?;
            detector.detect_def(img, &mut keypoints)?;
        }
        DetectorKind::Brisk => {
            let mut detector = BRISK::create(
                params.brisk.threshold,
                params.brisk.octaves,
                params.brisk.pattern_scale,
            )?;
            detector.detect_def(img, &mut keypoints)?;
        }
        DetectorKind::Orb => {
            let orb = &params.orb;
            let mut detector = ORB::create(
                orb.n_features,
                orb.scale_factor,
                orb.n_levels,
                orb.edge_threshold,
                orb.first_level,
                orb.wta_k,
                orb.score.into(),
                orb.patch_size,
                orb.fast_threshold,
            )?;
            detector.detect_def(img, &mut keypoints)?;
        }
        DetectorKind::Akaze => {
            let akaze = &params.akaze;
            let mut detector = AKAZE::create(
                AKAZE_DescriptorType::DESCRIPTOR_MLDB,
                akaze.descriptor_size,
                akaze.descriptor_channels,
                akaze.threshold,
                akaze.n_octaves,
                akaze.n_octave_layers,
                KAZE_DiffusivityType::DIFF_PM_G2,
                akaze.max_points,
            )?;
            detector.detect_def(img, &mut keypoints)?;
        }
        DetectorKind::Sift => {
            let sift = &params.sift;
            let mut detector = SIFT::create(
                sift.n_features,
                sift.n_octave_layers,
                sift.contrast_threshold,
                sift.edge_threshold,
                sift.sigma,
                sift.enable_precise_upscale,
            )?;
            detector.detect_def(img, &mut keypoints)?;
        }
        DetectorKind::ShiTomasi | DetectorKind::Harris => {
            return Err(Error::new(
                StsBadArg as i32,
                format!("{} не относится к детекторам features2d", kind),
            ));
        }
    }
    info!(
        "{}: найдено {} ключевых точек за {:?}",
        kind,
        keypoints.len(),
        stopwatch.elapsed()
    );

    if visualize {
        show_keypoints(img, &keypoints, &kind.window_name())?;
    }
    Ok(keypoints)
}

/// Находит ключевые точки на полутоновом изображении выбранным детектором.
pub fn detect_keypoints(
    img: &Mat,
    kind: DetectorKind,
    params: &FeatureParams,
    visualize: bool,
) -> Result<Vector<KeyPoint>, Error> {
    match kind {
        DetectorKind::ShiTomasi => detect_keypoints_shi_tomasi(img, &params.shi_tomasi, visualize),
        DetectorKind::Harris => detect_keypoints_harris(img, &params.harris, visualize),
        _ => detect_keypoints_modern(img, kind, params, visualize),
    }
}
