use std::collections::VecDeque;

use opencv::core::{DMatch, KeyPoint, Vector};
use opencv::prelude::*;

/// Всё, что известно об одном кадре последовательности.
#[derive(Debug, Default)]
pub struct DataFrame {
    pub image: Mat,
    pub keypoints: Vector<KeyPoint>,
    pub descriptors: Mat,
    /// Совпадения между предыдущим кадром и этим
    pub matches: Vector<DMatch>,
}

impl DataFrame {
    pub fn new(image: Mat) -> Self {
        Self {
            image,
            ..Default::default()
        }
    }
}

/// Кольцевой буфер кадров: при переполнении выбрасывается самый старый.
#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<DataFrame>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Добавляет кадр и возвращает вытесненный, если буфер был полон.
    pub fn push(&mut self, frame: DataFrame) -> Option<DataFrame> {
        let evicted = if self.frames.len() == self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    pub fn current(&self) -> Option<&DataFrame> {
        self.frames.back()
    }

    pub fn current_mut(&mut self) -> Option<&mut DataFrame> {
        self.frames.back_mut()
    }

    pub fn previous(&self) -> Option<&DataFrame> {
        self.frames.len().checked_sub(2).and_then(|i| self.frames.get(i))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{CV_8UC1, Scalar};

    fn frame(value: f64) -> DataFrame {
        DataFrame::new(Mat::new_rows_cols_with_default(2, 2, CV_8UC1, Scalar::all(value)).unwrap())
    }

    fn pixel(frame: &DataFrame) -> u8 {
        *frame.image.at_2d::<u8>(0, 0).unwrap()
    }

    #[test]
    fn buffer_evicts_oldest_frame() {
        let mut buffer = FrameBuffer::default();
        assert!(buffer.is_empty());
        assert!(buffer.push(frame(1.0)).is_none());
        assert!(buffer.previous().is_none());
        assert!(buffer.push(frame(2.0)).is_none());

        let evicted = buffer.push(frame(3.0)).unwrap();
        assert_eq!(pixel(&evicted), 1);
        assert_eq!(buffer.len(), 2);
        assert_eq!(pixel(buffer.previous().unwrap()), 2);
        assert_eq!(pixel(buffer.current().unwrap()), 3);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buffer = FrameBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(frame(1.0));
        buffer.push(frame(2.0));
        assert_eq!(buffer.len(), 1);
        assert!(buffer.previous().is_none());
    }
}
