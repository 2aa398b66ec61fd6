//! Наборы параметров детекторов и дескрипторов.
//!
//! Значения по умолчанию совпадают с теми, с которыми создавались объекты OpenCV
//! в исходном пайплайне. Любое поле можно переопределить из файла конфигурации,
//! остальные поля при этом берутся из `Default`.

use opencv::features2d::ORB_ScoreType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiTomasiParams {
    /// Размер окна для матрицы ковариации производных
    pub block_size: i32,
    /// Допустимое перекрытие соседних углов, доля от `block_size`
    pub max_overlap: f64,
    pub quality_level: f64,
    pub k: f64,
}

impl Default for ShiTomasiParams {
    fn default() -> Self {
        Self {
            block_size: 4,
            max_overlap: 0.0,
            quality_level: 0.01,
            k: 0.04,
        }
    }
}

impl ShiTomasiParams {
    pub fn min_distance(&self) -> f64 {
        (1.0 - self.max_overlap) * self.block_size as f64
    }

    /// Максимальное число углов зависит от размера изображения.
    pub fn max_corners(&self, rows: i32, cols: i32) -> i32 {
        (rows as f64 * cols as f64 / self.min_distance().max(1.0)) as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParams {
    pub block_size: i32,
    pub aperture_size: i32,
    pub k: f64,
    /// Порог по нормированному в [0, 255] отклику
    pub min_response: i32,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            block_size: 2,
            aperture_size: 3,
            k: 0.04,
            min_response: 125,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastParams {
    pub threshold: i32,
    pub nonmax_suppression: bool,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            threshold: 10,
            nonmax_suppression: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriskParams {
    /// Порог FAST/AGAST
    pub threshold: i32,
    /// 0 - один масштаб
    pub octaves: i32,
    pub pattern_scale: f32,
}

impl Default for BriskParams {
    fn default() -> Self {
        Self {
            threshold: 30,
            octaves: 3,
            pattern_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbScore {
    Harris,
    Fast,
}

impl From<OrbScore> for ORB_ScoreType {
    fn from(score: OrbScore) -> Self {
        match score {
            OrbScore::Harris => ORB_ScoreType::HARRIS_SCORE,
            OrbScore::Fast => ORB_ScoreType::FAST_SCORE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbParams {
    pub n_features: i32,
    pub scale_factor: f32,
    pub n_levels: i32,
    pub edge_threshold: i32,
    pub first_level: i32,
    pub wta_k: i32,
    pub score: OrbScore,
    pub patch_size: i32,
    pub fast_threshold: i32,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            first_level: 0,
            wta_k: 2,
            score: OrbScore::Harris,
            patch_size: 31,
            fast_threshold: 20,
        }
    }
}

/// Тип дескриптора MLDB и диффузия PM_G2 зафиксированы.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AkazeParams {
    /// 0 - полный размер
    pub descriptor_size: i32,
    pub descriptor_channels: i32,
    pub threshold: f32,
    pub n_octaves: i32,
    pub n_octave_layers: i32,
    /// -1 - без ограничения
    pub max_points: i32,
}

impl Default for AkazeParams {
    fn default() -> Self {
        Self {
            descriptor_size: 0,
            descriptor_channels: 3,
            threshold: 0.001,
            n_octaves: 4,
            n_octave_layers: 4,
            max_points: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftParams {
    /// 0 - без ограничения
    pub n_features: i32,
    pub n_octave_layers: i32,
    pub contrast_threshold: f64,
    pub edge_threshold: f64,
    pub sigma: f64,
    pub enable_precise_upscale: bool,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            n_features: 0,
            n_octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
            enable_precise_upscale: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefParams {
    /// Длина дескриптора в байтах: 16, 32 или 64
    pub bytes: i32,
    pub use_orientation: bool,
}

impl Default for BriefParams {
    fn default() -> Self {
        Self {
            bytes: 32,
            use_orientation: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreakParams {
    pub orientation_normalized: bool,
    pub scale_normalized: bool,
    pub pattern_scale: f32,
    pub n_octaves: i32,
    /// Пустой список - пары по умолчанию
    pub selected_pairs: Vec<i32>,
}

impl Default for FreakParams {
    fn default() -> Self {
        Self {
            orientation_normalized: true,
            scale_normalized: true,
            pattern_scale: 22.0,
            n_octaves: 4,
            selected_pairs: Vec::new(),
        }
    }
}

/// Все параметры детекторов и дескрипторов вместе.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    pub shi_tomasi: ShiTomasiParams,
    pub harris: HarrisParams,
    pub fast: FastParams,
    pub brisk: BriskParams,
    pub orb: OrbParams,
    pub akaze: AkazeParams,
    pub sift: SiftParams,
    pub brief: BriefParams,
    pub freak: FreakParams,
}
