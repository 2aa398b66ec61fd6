use std::path::PathBuf;

use log::debug;
use opencv::core::StsObjectNotFound;
use opencv::prelude::*;
use opencv::{Error, imgcodecs, imgproc};
use serde::{Deserialize, Serialize};

/// Нумерованная последовательность изображений на диске.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSequence {
    pub base_dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    pub first_index: usize,
    pub last_index: usize,
    /// Ширина номера кадра, дополняется нулями слева
    pub fill_width: usize,
}

impl Default for ImageSequence {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("images/KITTI/2011_09_26/image_00/data"),
            prefix: "000000".to_string(),
            extension: ".png".to_string(),
            first_index: 0,
            last_index: 9,
            fill_width: 4,
        }
    }
}

impl ImageSequence {
    pub fn len(&self) -> usize {
        (self.last_index + 1).saturating_sub(self.first_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Путь к кадру со смещением `offset` от первого.
    pub fn path(&self, offset: usize) -> PathBuf {
        let index = self.first_index + offset;
        self.base_dir.join(format!(
            "{}{:0width$}{}",
            self.prefix,
            index,
            self.extension,
            width = self.fill_width
        ))
    }

    /// Загружает кадр и переводит его в оттенки серого.
    pub fn load_gray(&self, offset: usize) -> Result<Mat, Error> {
        let path = self.path(offset);
        let img = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
        if img.empty() {
            return Err(Error::new(
                StsObjectNotFound as i32,
                format!("Не удалось прочитать изображение {}", path.display()),
            ));
        }
        let mut gray = Mat::default();
        imgproc::cvt_color_def(&img, &mut gray, imgproc::COLOR_BGR2GRAY)?;
        debug!(
            "Загружен кадр {}: {}x{}",
            path.display(),
            gray.cols(),
            gray.rows()
        );
        Ok(gray)
    }
}
