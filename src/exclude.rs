// src/exclude.rs
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};

/// Набор правил игнорирования: пути и лимиты размера. Хранится в плоском
/// текстовом файле, по одному правилу на строку, в отсортированном виде.
/// Строка с суффиксом MB/GB считается лимитом размера, остальные — путями.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    paths: BTreeSet<String>,
    sizes: BTreeSet<String>,
}

/// Разбирает лимит размера вида "50MB" или "1.5GB" в мегабайты.
/// GB переводится в MB умножением на 1024.
pub fn parse_size_limit(input: &str) -> Result<f64> {
    let normalized = input.trim().to_uppercase();

    let (number_part, multiplier) = if let Some(n) = normalized.strip_suffix("GB") {
        (n, 1024.0)
    } else if let Some(n) = normalized.strip_suffix("MB") {
        (n, 1.0)
    } else {
        return Err(BackupError::InvalidFormat(input.to_string()));
    };

    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| BackupError::InvalidFormat(input.to_string()))?;

    if !value.is_finite() || value < 0.0 {
        return Err(BackupError::InvalidFormat(input.to_string()));
    }

    Ok(value * multiplier)
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет правило-путь. Правило с ведущим '/' трактуется как путь
    /// от корня рабочей директории, без него — как имя верхнего уровня.
    pub fn add_path(&mut self, item: &str) {
        let item = item.trim();
        if !item.is_empty() {
            self.paths.insert(item.to_string());
        }
    }

    /// Добавляет лимит размера, предварительно проверив формат
    pub fn add_size(&mut self, limit: &str) -> Result<()> {
        parse_size_limit(limit)?;
        self.sizes.insert(limit.trim().to_uppercase());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.sizes.is_empty()
    }

    /// Все правила одним отсортированным списком (для показа и записи)
    pub fn entries(&self) -> Vec<String> {
        let mut all: BTreeSet<&String> = self.paths.iter().collect();
        all.extend(self.sizes.iter());
        all.into_iter().cloned().collect()
    }

    /// Правила-пути, приведенные к разрешенным абсолютным путям
    /// относительно рабочей директории
    pub fn resolved_paths(&self, work_dir: &Path) -> Vec<PathBuf> {
        self.paths
            .iter()
            .map(|rule| {
                let stripped = rule.strip_prefix('/').unwrap_or(rule);
                let joined = work_dir.join(stripped);
                // Несуществующий путь канонизировать нельзя, сравниваем как есть
                joined.canonicalize().unwrap_or(joined)
            })
            .collect()
    }

    /// Проверяет, исключен ли путь: совпадение с правилом или вложенность
    /// в него, по разрешенным (симлинки раскрыты) путям
    pub fn is_path_excluded(&self, path: &Path, work_dir: &Path) -> bool {
        if self.paths.is_empty() {
            return false;
        }
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.resolved_paths(work_dir)
            .iter()
            .any(|rule| resolved == *rule || resolved.starts_with(rule))
    }

    /// Проверяет, превышает ли размер файла хотя бы один лимит.
    /// Сравнение в мегабайтах без округления.
    pub fn is_size_excluded(&self, size_bytes: u64) -> bool {
        let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
        self.sizes
            .iter()
            // Правила из файла могли быть отредактированы вручную,
            // нечитаемые лимиты пропускаем
            .filter_map(|limit| parse_size_limit(limit).ok())
            .any(|limit_mb| size_mb >= limit_mb)
    }

    /// Записывает все правила в файл, отсортированно и по одному на строку
    pub fn persist(&self, path: &Path) -> Result<()> {
        let mut content = String::new();
        for entry in self.entries() {
            content.push_str(&entry);
            content.push('\n');
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Читает правила из файла. Отсутствующий файл дает пустой набор.
    pub fn load(path: &Path) -> Result<Self> {
        let mut set = Self::new();
        if !path.exists() {
            return Ok(set);
        }

        let content = fs::read_to_string(path)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let upper = line.to_uppercase();
            if upper.ends_with("MB") || upper.ends_with("GB") {
                set.sizes.insert(upper);
            } else {
                set.paths.insert(line.to_string());
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_size_limit() {
        assert_eq!(parse_size_limit("50MB").unwrap(), 50.0);
        assert_eq!(parse_size_limit("1GB").unwrap(), 1024.0);
        assert_eq!(parse_size_limit("1.5gb").unwrap(), 1536.0);
        assert_eq!(parse_size_limit(" 2 MB ").unwrap(), 2.0);

        assert!(parse_size_limit("50").is_err());
        assert!(parse_size_limit("xMB").is_err());
        assert!(parse_size_limit("-1MB").is_err());
        assert!(parse_size_limit("MB").is_err());
    }

    #[test]
    fn test_size_exclusion_union() {
        let mut set = ExclusionSet::new();
        set.add_size("5MB").unwrap();
        set.add_size("1GB").unwrap();

        // Срабатывает самый нижний из лимитов
        assert!(set.is_size_excluded(5 * 1024 * 1024));
        assert!(set.is_size_excluded(6 * 1024 * 1024));
        assert!(!set.is_size_excluded(4 * 1024 * 1024));
    }

    #[test]
    fn test_path_exclusion_exact_and_descendant() {
        let temp = tempdir().unwrap();
        let work = temp.path().canonicalize().unwrap();
        std::fs::create_dir(work.join("core")).unwrap();
        std::fs::write(work.join("core/a.txt"), "x").unwrap();
        std::fs::write(work.join("keep.txt"), "y").unwrap();

        let mut set = ExclusionSet::new();
        set.add_path("/core");

        assert!(set.is_path_excluded(&work.join("core"), &work));
        assert!(set.is_path_excluded(&work.join("core/a.txt"), &work));
        assert!(!set.is_path_excluded(&work.join("keep.txt"), &work));
    }

    #[test]
    fn test_bare_name_rule() {
        let temp = tempdir().unwrap();
        let work = temp.path().canonicalize().unwrap();
        std::fs::write(work.join("notes.txt"), "x").unwrap();

        let mut set = ExclusionSet::new();
        set.add_path("notes.txt");

        assert!(set.is_path_excluded(&work.join("notes.txt"), &work));
    }

    #[test]
    fn test_persist_load_round_trip() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("ignored_items.log");

        let mut set = ExclusionSet::new();
        set.add_path("/core");
        set.add_path("notes.txt");
        set.add_size("50MB").unwrap();
        set.add_size("1GB").unwrap();

        set.persist(&file).unwrap();
        let loaded = ExclusionSet::load(&file).unwrap();

        assert_eq!(set, loaded);
        // Повторная запись дает байт-в-байт тот же файл
        let first = std::fs::read_to_string(&file).unwrap();
        loaded.persist(&file).unwrap();
        assert_eq!(first, std::fs::read_to_string(&file).unwrap());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = tempdir().unwrap();
        let set = ExclusionSet::load(&temp.path().join("missing.log")).unwrap();
        assert!(set.is_empty());
    }
}
