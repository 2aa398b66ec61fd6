use opencv::core::{KeyPoint, Rect2f, Vector};
use opencv::features2d::KeyPointsFilter;
use opencv::prelude::*;
use opencv::Error;
use serde::{Deserialize, Serialize};

use crate::detection::DetectorKind;

/// Прямоугольная область интереса в пикселях.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for FocusRect {
    /// Впереди идущая машина на кадрах KITTI.
    fn default() -> Self {
        Self {
            x: 535.0,
            y: 180.0,
            width: 180.0,
            height: 150.0,
        }
    }
}

impl From<FocusRect> for Rect2f {
    fn from(rect: FocusRect) -> Self {
        Rect2f::new(rect.x, rect.y, rect.width, rect.height)
    }
}

/// Оставляет только точки внутри прямоугольника.
pub fn retain_in_rect(keypoints: &Vector<KeyPoint>, rect: FocusRect) -> Vector<KeyPoint> {
    let rect = Rect2f::from(rect);
    keypoints
        .iter()
        .filter(|kp| rect.contains(kp.pt()))
        .collect()
}

/// Ограничивает число точек `max_keypoints` лучшими по отклику.
///
/// У Ши-Томаси отклик не заполнен, поэтому сначала просто обрезаем список.
pub fn limit_keypoints(
    keypoints: &mut Vector<KeyPoint>,
    max_keypoints: usize,
    detector: DetectorKind,
) -> Result<(), Error> {
    if detector == DetectorKind::ShiTomasi && keypoints.len() > max_keypoints {
        *keypoints = keypoints.iter().take(max_keypoints).collect();
    }
    KeyPointsFilter::retain_best(keypoints, max_keypoints as i32)?;
    Ok(())
}

/// Статистика размера окрестности ключевых точек.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeypointStats {
    pub count: usize,
    pub min_size: f32,
    pub mean_size: f32,
    pub max_size: f32,
}

impl KeypointStats {
    pub fn from_keypoints(keypoints: &Vector<KeyPoint>) -> Self {
        if keypoints.is_empty() {
            return Self::default();
        }
        let mut min_size = f32::MAX;
        let mut max_size = f32::MIN;
        let mut total = 0.0f64;
        for kp in keypoints.iter() {
            let size = kp.size();
            min_size = min_size.min(size);
            max_size = max_size.max(size);
            total += size as f64;
        }
        Self {
            count: keypoints.len(),
            min_size,
            mean_size: (total / keypoints.len() as f64) as f32,
            max_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypoint(x: f32, y: f32, size: f32, response: f32) -> KeyPoint {
        KeyPoint::new_coords(x, y, size, -1.0, response, 0, -1).unwrap()
    }

    #[test]
    fn keeps_points_inside_vehicle_box() {
        let mut keypoints = Vector::<KeyPoint>::new();
        keypoints.push(keypoint(600.0, 250.0, 4.0, 0.0));
        keypoints.push(keypoint(10.0, 10.0, 4.0, 0.0));
        keypoints.push(keypoint(535.0, 180.0, 4.0, 0.0));
        keypoints.push(keypoint(715.0, 200.0, 4.0, 0.0));

        let kept = retain_in_rect(&keypoints, FocusRect::default());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.get(0).unwrap().pt().x, 600.0);
        assert_eq!(kept.get(1).unwrap().pt().x, 535.0);
    }

    #[test]
    fn limit_keeps_strongest_responses() {
        let mut keypoints = Vector::<KeyPoint>::new();
        for i in 0..10 {
            keypoints.push(keypoint(i as f32, 0.0, 4.0, i as f32));
        }
        limit_keypoints(&mut keypoints, 3, DetectorKind::Fast).unwrap();

        assert_eq!(keypoints.len(), 3);
        for kp in keypoints.iter() {
            assert!(kp.response() >= 7.0);
        }
    }

    #[test]
    fn limit_truncates_shi_tomasi_in_order() {
        let mut keypoints = Vector::<KeyPoint>::new();
        for i in 0..10 {
            keypoints.push(keypoint(i as f32, 0.0, 4.0, 0.0));
        }
        limit_keypoints(&mut keypoints, 5, DetectorKind::ShiTomasi).unwrap();

        assert_eq!(keypoints.len(), 5);
        let xs: Vec<f32> = keypoints.iter().map(|kp| kp.pt().x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn limit_above_count_is_noop() {
        let mut keypoints = Vector::<KeyPoint>::new();
        keypoints.push(keypoint(1.0, 1.0, 4.0, 1.0));
        limit_keypoints(&mut keypoints, 50, DetectorKind::Orb).unwrap();
        assert_eq!(keypoints.len(), 1);
    }

    #[test]
    fn neighbourhood_stats() {
        let mut keypoints = Vector::<KeyPoint>::new();
        keypoints.push(keypoint(0.0, 0.0, 2.0, 0.0));
        keypoints.push(keypoint(0.0, 0.0, 4.0, 0.0));
        keypoints.push(keypoint(0.0, 0.0, 9.0, 0.0));

        let stats = KeypointStats::from_keypoints(&keypoints);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_size, 2.0);
        assert_eq!(stats.mean_size, 5.0);
        assert_eq!(stats.max_size, 9.0);
        assert_eq!(KeypointStats::from_keypoints(&Vector::new()), KeypointStats::default());
    }
}
