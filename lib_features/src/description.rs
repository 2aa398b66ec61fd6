use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info};
use opencv::core::{KeyPoint, StsBadArg, Vector};
use opencv::features2d::{
    AKAZE, AKAZE_DescriptorType, BRISK, Feature2DTrait, KAZE_DiffusivityType, ORB, SIFT,
};
use opencv::prelude::*;
use opencv::xfeatures2d::{BriefDescriptorExtractor, FREAK};
use opencv::Error;
use serde::{Deserialize, Serialize};

use crate::detection::DetectorKind;
use crate::params::FeatureParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DescriptorKind {
    Brisk,
    Brief,
    Orb,
    Freak,
    Akaze,
    Sift,
}

/// Семейство дескриптора определяет норму при сопоставлении.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorFamily {
    #[serde(rename = "DES_BINARY")]
    Binary,
    #[serde(rename = "DES_HOG")]
    Hog,
}

impl DescriptorKind {
    pub const ALL: [DescriptorKind; 6] = [
        DescriptorKind::Brisk,
        DescriptorKind::Brief,
        DescriptorKind::Orb,
        DescriptorKind::Freak,
        DescriptorKind::Akaze,
        DescriptorKind::Sift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DescriptorKind::Brisk => "BRISK",
            DescriptorKind::Brief => "BRIEF",
            DescriptorKind::Orb => "ORB",
            DescriptorKind::Freak => "FREAK",
            DescriptorKind::Akaze => "AKAZE",
            DescriptorKind::Sift => "SIFT",
        }
    }

    pub fn family(&self) -> DescriptorFamily {
        match self {
            DescriptorKind::Sift => DescriptorFamily::Hog,
            _ => DescriptorFamily::Binary,
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DescriptorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DescriptorKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::new(
                    StsBadArg as i32,
                    format!("Неизвестный тип дескриптора: {}", s),
                )
            })
    }
}

/// Отбрасывает сочетания, которые OpenCV не умеет обрабатывать:
/// AKAZE описывает только свои точки, ORB падает на точках SIFT.
pub fn check_combination(detector: DetectorKind, descriptor: DescriptorKind) -> Result<(), Error> {
    let incompatible = match descriptor {
        DescriptorKind::Akaze => detector != DetectorKind::Akaze,
        DescriptorKind::Orb => detector == DetectorKind::Sift,
        _ => false,
    };
    if incompatible {
        return Err(Error::new(
            StsBadArg as i32,
            format!(
                "Дескриптор {} не работает с ключевыми точками {}",
                descriptor, detector
            ),
        ));
    }
    Ok(())
}

fn compute_descriptors(
    extractor: &mut impl Feature2DTrait,
    img: &Mat,
    keypoints: &mut Vector<KeyPoint>,
) -> Result<Mat, Error> {
    let mut descriptors = Mat::default();
    extractor.compute(img, keypoints, &mut descriptors)?;
    Ok(descriptors)
}

/// Вычисляет дескрипторы для найденных точек.
///
/// Точки, для которых дескриптор посчитать нельзя (например, у края
/// изображения), OpenCV удаляет из `keypoints`, поэтому строки матрицы
/// всегда соответствуют оставшимся точкам.
pub fn describe_keypoints(
    keypoints: &mut Vector<KeyPoint>,
    img: &Mat,
    kind: DescriptorKind,
    params: &FeatureParams,
) -> Result<Mat, Error> {
    if keypoints.is_empty() {
        debug!("{}: нет точек для описания", kind);
        return Ok(Mat::default());
    }
    debug!("Используется дескриптор {}", kind);

    let stopwatch = Instant::now();
    let descriptors = match kind {
        DescriptorKind::Brisk => {
            let brisk = &params.brisk;
            let mut extractor =
                BRISK::create(brisk.threshold, brisk.octaves, brisk.pattern_scale)?;
            compute_descriptors(&mut extractor, img, keypoints)?
        }
        DescriptorKind::Brief => {
            let mut extractor =
                BriefDescriptorExtractor::create(params.brief.bytes, params.brief.use_orientation)?;
            compute_descriptors(&mut extractor, img, keypoints)?
        }
        DescriptorKind::Orb => {
            let orb = &params.orb;
            let mut extractor = ORB::create(
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
            compute_descriptors(&mut extractor, img, keypoints)?
        }
        DescriptorKind::Freak => {
            let freak = &params.freak;
            let selected_pairs = Vector::<i32>::from_iter(freak.selected_pairs.iter().copied());
            let mut extractor = FREAK::create(
                freak.orientation_normalized,
                freak.scale_normalized,
                freak.pattern_scale,
                freak.n_octaves,
                &selected_pairs,
            )?;
            compute_descriptors(&mut extractor, img, keypoints)?
        }
        DescriptorKind::Akaze => {
            let akaze = &params.akaze;
            let mut extractor = AKAZE::create(
                AKAZE_DescriptorType::DESCRIPTOR_MLDB,
                akaze.descriptor_size,
                akaze.descriptor_channels,
                akaze.threshold,
                akaze.n_octaves,
                akaze.n_octave_layers,
                KAZE_DiffusivityType::DIFF_PM_G2,
                akaze.max_points,
            )?;
            compute_descriptors(&mut extractor, img, keypoints)?
        }
        DescriptorKind::Sift => {
            let sift = &params.sift;
            let mut extractor = SIFT::create(
                sift.n_features,
                sift.n_octave_layers,
                sift.contrast_threshold,
                sift.edge_threshold,
                sift.sigma,
                sift.enable_precise_upscale,
            )?;
            compute_descriptors(&mut extractor, img, keypoints)?
        }
    };
    info!(
        "{}: дескрипторы для {} точек вычислены за {:?}",
        kind,
        keypoints.len(),
        stopwatch.elapsed()
    );
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detect_keypoints;
    use crate::test_utils::square_grid;

    #[test]
    fn only_sift_is_gradient_based() {
        for kind in DescriptorKind::ALL {
            let expected = if kind == DescriptorKind::Sift {
                DescriptorFamily::Hog
            } else {
                DescriptorFamily::Binary
            };
            assert_eq!(kind.family(), expected);
        }
    }

    #[test]
    fn descriptor_names_round_trip_through_from_str() {
        for kind in DescriptorKind::ALL {
            assert_eq!(kind.to_string().parse::<DescriptorKind>().unwrap(), kind);
        }
        assert_eq!("freak".parse::<DescriptorKind>().unwrap(), DescriptorKind::Freak);
        assert!("SURF".parse::<DescriptorKind>().is_err());
    }

    #[test]
    fn akaze_descriptor_requires_akaze_keypoints() {
        for detector in DetectorKind::ALL {
            let result = check_combination(detector, DescriptorKind::Akaze);
            assert_eq!(result.is_ok(), detector == DetectorKind::Akaze);
        }
    }

    #[test]
    fn orb_descriptor_rejects_sift_keypoints() {
        assert!(check_combination(DetectorKind::Sift, DescriptorKind::Orb).is_err());
        assert!(check_combination(DetectorKind::Fast, DescriptorKind::Orb).is_ok());
        assert!(check_combination(DetectorKind::Sift, DescriptorKind::Sift).is_ok());
    }

    #[test]
    fn descriptor_rows_follow_surviving_keypoints() {
        let img = square_grid(200, 200, 25).unwrap();
        let params = FeatureParams::default();
        let mut keypoints = detect_keypoints(&img, DetectorKind::Fast, &params, false).unwrap();
        assert!(!keypoints.is_empty());

        let descriptors =
            describe_keypoints(&mut keypoints, &img, DescriptorKind::Brisk, &params).unwrap();
        assert_eq!(descriptors.rows() as usize, keypoints.len());
    }

    #[test]
    fn brief_descriptor_length_follows_params() {
        let img = square_grid(200, 200, 25).unwrap();
        let params = FeatureParams::default();
        let mut keypoints = detect_keypoints(&img, DetectorKind::Fast, &params, false).unwrap();

        let descriptors =
            describe_keypoints(&mut keypoints, &img, DescriptorKind::Brief, &params).unwrap();
        if !keypoints.is_empty() {
            assert_eq!(descriptors.cols(), params.brief.bytes);
            assert_eq!(descriptors.typ(), opencv::core::CV_8U);
        }
    }

    #[test]
    fn sift_descriptors_are_float() {
        let img = square_grid(200, 200, 25).unwrap();
        let params = FeatureParams::default();
        let mut keypoints = detect_keypoints(&img, DetectorKind::Sift, &params, false).unwrap();

        let descriptors =
            describe_keypoints(&mut keypoints, &img, DescriptorKind::Sift, &params).unwrap();
        if !keypoints.is_empty() {
            assert_eq!(descriptors.cols(), 128);
            assert_eq!(descriptors.typ(), opencv::core::CV_32F);
        }
    }
}
