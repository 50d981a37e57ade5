// src/archive.rs
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{BackupError, Result};

/// Запись zip-архива: добавление файлов с максимальным сжатием
pub struct ArchiveWriter {
    inner: ZipWriter<fs::File>,
}

impl ArchiveWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = fs::File::create(path)?;
        Ok(Self {
            inner: ZipWriter::new(file),
        })
    }

    /// Добавляет файл под именем arc_name (прямые слэши, путь относительно
    /// корня рабочей директории). Содержимое копируется потоково.
    pub fn add_file(&mut self, src: &Path, arc_name: &str) -> Result<()> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9));

        self.inner.start_file(arc_name, options)?;
        let mut file = fs::File::open(src)?;
        io::copy(&mut file, &mut self.inner)?;
        Ok(())
    }

    /// Дописывает центральный каталог и закрывает архив
    pub fn finish(self) -> Result<()> {
        self.inner.finish()?;
        Ok(())
    }
}

/// Чтение zip-архива: список записей, извлечение, проверка целостности
pub struct ArchiveReader {
    inner: ZipArchive<fs::File>,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        Ok(Self {
            inner: ZipArchive::new(file)?,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Имена всех записей в порядке следования в архиве
    pub fn entry_names(&self) -> Vec<String> {
        self.inner.file_names().map(String::from).collect()
    }

    /// Полностью декодирует каждую запись. Несовпадение CRC или битый
    /// поток сжатия дают CorruptArchive с именем записи.
    pub fn test_integrity(&mut self) -> Result<()> {
        for i in 0..self.inner.len() {
            let mut entry = self.inner.by_index(i)?;
            let name = entry.name().to_string();
            io::copy(&mut entry, &mut io::sink())
                .map_err(|e| BackupError::CorruptArchive(format!("{name}: {e}")))?;
        }
        Ok(())
    }

    /// Извлекает одну запись под dest_root, перезаписывая существующий
    /// путь. Возвращает путь извлеченного файла.
    pub fn extract_entry(&mut self, name: &str, dest_root: &Path) -> Result<PathBuf> {
        let mut entry = self.inner.by_name(name)?;

        // Защита от записей с abs-путями или '..'
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| BackupError::CorruptArchive(format!("unsafe entry name: {name}")))?;
        let dest = dest_root.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
        Ok(dest)
    }

    /// Извлекает все записи под dest_root, вызывая колбэк после каждой
    pub fn extract_all<F>(&mut self, dest_root: &Path, mut on_entry: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        for name in self.entry_names() {
            self.extract_entry(&name, dest_root)?;
            on_entry(&name);
        }
        Ok(())
    }
}
