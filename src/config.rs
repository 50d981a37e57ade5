// src/config.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};

/// Имя конфигурационного файла в рабочей директории
const LOCAL_CONFIG_NAME: &str = "arkhiv.toml";

/// Настройки хранилища
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Имя директории хранилища внутри рабочей директории
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Имя файла журнала истории (внутри хранилища)
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Имя файла списка игнорирования (внутри хранилища)
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
}

fn default_store_dir() -> String {
    "user_backup".to_string()
}
fn default_log_file() -> String {
    "backup_restore.log".to_string()
}
fn default_ignore_file() -> String {
    "ignored_items.log".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            log_file: default_log_file(),
            ignore_file: default_ignore_file(),
        }
    }
}

impl Config {
    /// Загружает конфигурацию из стандартных путей или указанного файла.
    /// Если ни один файл не найден, возвращает значения по умолчанию.
    pub fn load(custom_path: Option<&Path>, work_dir: &Path) -> Result<Self> {
        for path in config_paths(custom_path, work_dir) {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Загружает конфигурацию из конкретного файла
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BackupError::InvalidFormat(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("store_dir", &self.store_dir),
            ("log_file", &self.log_file),
            ("ignore_file", &self.ignore_file),
        ] {
            if value.is_empty() {
                return Err(BackupError::InvalidFormat(format!("{key} must not be empty")));
            }
            if value.contains('/') || value.contains('\\') {
                return Err(BackupError::InvalidFormat(format!(
                    "{key} must be a plain name, not a path: {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Возвращает список путей для поиска конфигурации
fn config_paths(custom_path: Option<&Path>, work_dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Пользовательский путь (если указан)
    if let Some(path) = custom_path {
        paths.push(path.to_path_buf());
    }

    // 2. Рабочая директория
    paths.push(work_dir.join(LOCAL_CONFIG_NAME));

    // 3. ~/.config/arkhiv/config.toml
    if let Some(home) = dirs::config_dir() {
        paths.push(home.join("arkhiv/config.toml"));
    }

    paths
}

/// Контекст одного запуска: рабочая директория, хранилище и служебные
/// файлы. Создается один раз и передается движкам явно, без глобального
/// состояния.
#[derive(Debug, Clone)]
pub struct Context {
    /// Рабочая директория (канонический путь)
    pub work_dir: PathBuf,

    /// Директория хранилища бэкапов
    pub store_dir: PathBuf,

    /// Файл журнала истории
    pub log_path: PathBuf,

    /// Файл списка игнорирования
    pub ignore_path: PathBuf,

    /// Имена верхнего уровня, которые никогда не попадают ни в бэкап,
    /// ни в список кандидатов на удаление
    pub skip_names: BTreeSet<String>,
}

impl Context {
    /// Создает контекст и инициализирует директорию хранилища
    pub fn new(work_dir: &Path, config: &Config) -> Result<Self> {
        let work_dir = work_dir.canonicalize()?;
        let store_dir = work_dir.join(&config.store_dir);
        fs::create_dir_all(&store_dir)?;

        let mut skip_names = BTreeSet::new();
        skip_names.insert(config.store_dir.clone());
        skip_names.insert(LOCAL_CONFIG_NAME.to_string());

        Ok(Self {
            log_path: store_dir.join(&config.log_file),
            ignore_path: store_dir.join(&config.ignore_file),
            work_dir,
            store_dir,
            skip_names,
        })
    }

    /// Путь к архиву в хранилище по его имени
    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(name)
    }

    /// Временная директория для проверки бэкапа
    pub fn scratch_dir(&self) -> PathBuf {
        self.store_dir.join("temp_verify")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_context_creates_store_dir() {
        let temp = tempdir().unwrap();
        let ctx = Context::new(temp.path(), &Config::default()).unwrap();

        assert!(ctx.store_dir.is_dir());
        assert!(ctx.skip_names.contains("user_backup"));
        assert_eq!(ctx.log_path, ctx.store_dir.join("backup_restore.log"));
    }

    #[test]
    fn test_config_rejects_path_values() {
        let config = Config {
            store_dir: "a/b".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("arkhiv.toml");
        std::fs::write(&path, "store_dir = \"vault\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.store_dir, "vault");
        assert_eq!(config.log_file, "backup_restore.log");
    }
}
