// src/error.rs
use std::path::PathBuf;

/// Закрытый набор ошибок ядра. Каждая операция верхнего уровня
/// возвращает ровно одну из этих ошибок, уже после очистки артефактов.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Некорректный формат лимита размера (ожидается число + MB/GB)
    #[error("invalid size limit format: '{0}' (use e.g. '50MB' or '1GB')")]
    InvalidFormat(String),

    /// После применения списка игнорирования не осталось файлов
    #[error("no files to backup after applying ignore list")]
    NoFiles,

    /// Архив не прошел проверку целостности на уровне кодека
    #[error("archive is corrupted: {0}")]
    CorruptArchive(String),

    /// Хэш извлеченной копии не совпал с исходным
    #[error("file verification failed: {}", .0.display())]
    Verification(PathBuf),

    /// Выбранный номер вне диапазона списка кандидатов
    #[error("invalid selection: {index} is out of range 1..={len}")]
    InvalidSelection { index: usize, len: usize },

    /// Неустранимая ошибка удаления при очистке рабочей директории
    #[error("unable to delete {}: {source}", .path.display())]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Прочие ошибки ввода-вывода
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// Ошибки кодека: IO пробрасываем как есть, все остальное означает
// поврежденный или нечитаемый архив.
impl From<zip::result::ZipError> for BackupError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => BackupError::Io(io),
            other => BackupError::CorruptArchive(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
