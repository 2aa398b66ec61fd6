use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info, warn};
use opencv::core::{CV_32F, DMatch, NORM_HAMMING, NORM_L2, StsBadArg, Vector};
use opencv::features2d::{BFMatcher, DescriptorMatcherTraitConst, FlannBasedMatcher};
use opencv::prelude::*;
use opencv::Error;
use serde::{Deserialize, Serialize};

use crate::description::DescriptorFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatcherKind {
    #[serde(rename = "MAT_BF")]
    BruteForce,
    #[serde(rename = "MAT_FLANN")]
    Flann,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorKind {
    #[serde(rename = "SEL_NN")]
    NearestNeighbour,
    #[serde(rename = "SEL_KNN")]
    KNearestNeighbours,
}

impl MatcherKind {
    pub fn name(&self) -> &'static str {
        match self {
            MatcherKind::BruteForce => "MAT_BF",
            MatcherKind::Flann => "MAT_FLANN",
        }
    }
}

impl SelectorKind {
    pub fn name(&self) -> &'static str {
        match self {
            SelectorKind::NearestNeighbour => "SEL_NN",
            SelectorKind::KNearestNeighbours => "SEL_KNN",
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MatcherKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [MatcherKind::BruteForce, MatcherKind::Flann]
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::new(
                    StsBadArg as i32,
                    format!("Неизвестный тип сопоставителя: {}", s),
                )
            })
    }
}

impl FromStr for SelectorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [SelectorKind::NearestNeighbour, SelectorKind::KNearestNeighbours]
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::new(
                    StsBadArg as i32,
                    format!("Неизвестный способ выбора совпадений: {}", s),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingParams {
    pub cross_check: bool,
    /// Число соседей для SEL_KNN
    pub k: i32,
    /// Порог отношения расстояний лучшего и второго соседа
    pub ratio: f32,
}

impl Default for MatchingParams {
    fn default() -> Self {
        Self {
            cross_check: false,
            k: 2,
            ratio: 0.8,
        }
    }
}

impl MatchingParams {
    /// Проверяет, что параметры имеют смысл для выбранного способа отбора.
    /// SEL_KNN нужны хотя бы два соседа для теста отношения, а перекрёстная
    /// проверка в OpenCV допустима только при одном соседе.
    pub fn validate(&self, selector: SelectorKind) -> Result<(), Error> {
        if selector != SelectorKind::KNearestNeighbours {
            return Ok(());
        }
        if self.k < 2 {
            return Err(Error::new(
                StsBadArg as i32,
                format!("Для {} нужно k >= 2, задано k = {}", selector, self.k),
            ));
        }
        if self.cross_check {
            return Err(Error::new(
                StsBadArg as i32,
                format!("{} несовместим с перекрёстной проверкой", selector),
            ));
        }
        Ok(())
    }
}

/// Тест отношения расстояний: лучший сосед остаётся, только если он
/// строго ближе, чем `ratio` от расстояния до второго.
pub fn ratio_filter(knn_matches: &Vector<Vector<DMatch>>, ratio: f32) -> Vector<DMatch> {
    knn_matches
        .iter()
        .filter_map(|neighbours| {
            let best = neighbours.get(0).ok()?;
            let second = neighbours.get(1).ok()?;
            (best.distance < ratio * second.distance).then_some(best)
        })
        .collect()
}

fn to_float(descriptors: &Mat) -> Result<Mat, Error> {
    if descriptors.typ() == CV_32F {
        return Ok(descriptors.clone());
    }
    let mut converted = Mat::default();
    descriptors.convert_to(&mut converted, CV_32F, 1.0, 0.0)?;
    Ok(converted)
}

fn select_matches(
    matcher: &impl DescriptorMatcherTraitConst,
    desc_source: &Mat,
    desc_ref: &Mat,
    selector: SelectorKind,
    params: &MatchingParams,
) -> Result<Vector<DMatch>, Error> {
    match selector {
        SelectorKind::NearestNeighbour => {
            let mut matches = Vector::<DMatch>::new();
            matcher.train_match_def(desc_source, desc_ref, &mut matches)?;
            Ok(matches)
        }
        SelectorKind::KNearestNeighbours => {
            let mut knn_matches = Vector::<Vector<DMatch>>::new();
            matcher.knn_train_match_def(desc_source, desc_ref, &mut knn_matches, params.k)?;
            let matches = ratio_filter(&knn_matches, params.ratio);
            let dropped = knn_matches.len().saturating_sub(matches.len());
            debug!(
                "Тест отношения расстояний отбросил {} из {} совпадений",
                dropped,
                knn_matches.len()
            );
            Ok(matches)
        }
    }
}

/// Сопоставляет дескрипторы двух кадров.
///
/// `desc_source` - запросы (query), `desc_ref` - обучающий набор (train),
/// поэтому `query_idx` указывает на точки источника, `train_idx` на точки
/// опорного кадра.
pub fn match_descriptors(
    desc_source: &Mat,
    desc_ref: &Mat,
    family: DescriptorFamily,
    matcher: MatcherKind,
    selector: SelectorKind,
    params: &MatchingParams,
) -> Result<Vector<DMatch>, Error> {
    params.validate(selector)?;
    if desc_source.empty() || desc_ref.empty() {
        warn!("Пустой набор дескрипторов, сопоставление пропущено");
        return Ok(Vector::new());
    }

    let stopwatch = Instant::now();
    let matches = match matcher {
        MatcherKind::BruteForce => {
            let norm_type = match family {
                DescriptorFamily::Binary => NORM_HAMMING,
                DescriptorFamily::Hog => NORM_L2,
            };
            let bf_matcher = BFMatcher::create(norm_type, params.cross_check)?;
            select_matches(&bf_matcher, desc_source, desc_ref, selector, params)?
        }
        MatcherKind::Flann => {
            // FLANN по умолчанию строит KD-деревья и работает только с float
            let desc_source = to_float(desc_source)?;
            let desc_ref = to_float(desc_ref)?;
            let flann_matcher = FlannBasedMatcher::create()?;
            select_matches(&flann_matcher, &desc_source, &desc_ref, selector, params)?
        }
    };
    info!(
        "{} + {}: {} совпадений за {:?}",
        matcher,
        selector,
        matches.len(),
        stopwatch.elapsed()
    );
    Ok(matches)
}
