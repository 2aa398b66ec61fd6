use std::path::PathBuf;

use thiserror::Error;

/// Ошибки уровня приложения: файлы конфигурации и отчётов плюс OpenCV.
#[derive(Debug, Error)]
pub enum FeaturesError {
    #[error("ошибка ввода-вывода {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("некорректный JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ошибка OpenCV: {0}")]
    OpenCv(#[from] opencv::Error),
}

impl FeaturesError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FeaturesError::Io {
            path: path.into(),
            source,
        }
    }
}
