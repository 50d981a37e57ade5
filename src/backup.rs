// src/backup.rs
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::config::Context;
use crate::error::{BackupError, Result};
use crate::exclude::ExclusionSet;
use crate::hash;
use crate::scan::{self, ResolvedFile};
use crate::store::{build_archive_name, size_mb_rounded, BackupCatalog, BackupRecord, HistoryLog};

/// Итог успешного создания бэкапа
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub record: BackupRecord,
    pub verified_files: usize,
}

/// Движок создания бэкапов: список файлов -> архив -> проверка ->
/// фиксация либо откат. Неудача любого шага не оставляет в хранилище
/// недописанного архива.
pub struct BackupEngine<'a> {
    ctx: &'a Context,
    exclusions: &'a ExclusionSet,
    log: &'a HistoryLog,
}

impl<'a> BackupEngine<'a> {
    pub fn new(ctx: &'a Context, exclusions: &'a ExclusionSet, log: &'a HistoryLog) -> Self {
        Self {
            ctx,
            exclusions,
            log,
        }
    }

    /// Создает бэкап рабочей директории с указанным комментарием.
    ///
    /// Шаги: сбор списка файлов с хэшированием, выделение номера, запись
    /// архива на максимальном сжатии, проверка целостности кодеком,
    /// контрольное извлечение с повторным хэшированием. Любая ошибка
    /// после начала записи удаляет архив и фиксируется в журнале.
    pub fn create(&self, comment: &str, progress: bool) -> Result<BackupOutcome> {
        // Шаг 1: список файлов и исходные хэши
        let files = scan::resolve(self.ctx, self.exclusions)?;
        if files.is_empty() {
            return Err(BackupError::NoFiles);
        }

        let mut digests: HashMap<PathBuf, String> = HashMap::with_capacity(files.len());
        for file in &files {
            digests.insert(file.path.clone(), hash::file_digest(&file.path)?);
        }

        // Шаг 2: номер и имя архива
        let catalog = BackupCatalog::new(self.ctx, self.log);
        let seq = catalog.next_sequence()?;
        let name = build_archive_name(seq, comment);
        let archive_path = self.ctx.archive_path(&name);

        // Шаг 3: запись архива, все или ничего
        if let Err(e) = self.write_archive(&files, &archive_path, progress) {
            self.log.append(&format!("Backup failed: {e}"));
            remove_archive(&archive_path);
            return Err(e);
        }

        // Шаг 4: проверка; при ошибке архив уже удален и сбой записан
        let verified_files = self.verify_or_discard(&name, &files, &digests, progress)?;

        // Шаг 5: фиксация
        let metadata = fs::metadata(&archive_path)?;
        let record = BackupRecord {
            name: name.clone(),
            seq,
            comment: name
                .strip_suffix(".zip")
                .and_then(|s| s.split_once("__"))
                .map(|(_, c)| c.to_string())
                .unwrap_or_default(),
            created: chrono::DateTime::from(metadata.modified()?),
            size_mb: size_mb_rounded(metadata.len()),
        };

        self.log.append(&format!(
            "{name} - {:.2} MB (Verified {verified_files} files)",
            record.size_mb
        ));

        Ok(BackupOutcome {
            record,
            verified_files,
        })
    }

    /// Пишет все файлы в новый архив
    fn write_archive(
        &self,
        files: &[ResolvedFile],
        archive_path: &Path,
        progress: bool,
    ) -> Result<()> {
        let pb = make_bar(progress, files.len() as u64, "Creating backup");

        let mut writer = ArchiveWriter::create(archive_path)?;
        for file in files {
            writer.add_file(&file.path, &file.arc_name)?;
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
        }
        writer.finish()?;

        if let Some(pb) = pb {
            pb.finish_with_message("Archive created");
        }
        Ok(())
    }

    /// Проверяет свежезаписанный архив; при любой ошибке удаляет его из
    /// хранилища, пишет сбой в журнал и возвращает ошибку.
    pub fn verify_or_discard(
        &self,
        name: &str,
        files: &[ResolvedFile],
        digests: &HashMap<PathBuf, String>,
        progress: bool,
    ) -> Result<usize> {
        let archive_path = self.ctx.archive_path(name);
        match self.verify_archive(&archive_path, files, digests, progress) {
            Ok(verified) => Ok(verified),
            Err(e) => {
                self.log.append(&format!("Backup failed: {e}"));
                remove_archive(&archive_path);
                Err(e)
            }
        }
    }

    /// Проверка архива: тест целостности кодеком, затем контрольное
    /// извлечение каждой записи во временную директорию и сравнение хэша
    /// с исходным. Временная директория удаляется в любом исходе.
    fn verify_archive(
        &self,
        archive_path: &Path,
        files: &[ResolvedFile],
        digests: &HashMap<PathBuf, String>,
        progress: bool,
    ) -> Result<usize> {
        let mut reader = ArchiveReader::open(archive_path)?;
        reader.test_integrity()?;

        let scratch = self.ctx.scratch_dir();
        if scratch.exists() {
            fs::remove_dir_all(&scratch)?;
        }
        fs::create_dir_all(&scratch)?;

        let result = self.verify_entries(&mut reader, files, digests, &scratch, progress);

        if let Err(e) = fs::remove_dir_all(&scratch) {
            eprintln!("[WARN] Could not remove temporary verification directory: {e}");
        }
        result
    }

    fn verify_entries(
        &self,
        reader: &mut ArchiveReader,
        files: &[ResolvedFile],
        digests: &HashMap<PathBuf, String>,
        scratch: &Path,
        progress: bool,
    ) -> Result<usize> {
        let pb = make_bar(progress, files.len() as u64, "Verifying files");

        let mut verified = 0;
        for file in files {
            let extracted = reader.extract_entry(&file.arc_name, scratch)?;
            let actual = hash::file_digest(&extracted)?;
            let expected = digests
                .get(&file.path)
                .ok_or_else(|| BackupError::Verification(file.path.clone()))?;
            if actual != *expected {
                return Err(BackupError::Verification(file.path.clone()));
            }
            verified += 1;
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("Verification completed");
        }
        Ok(verified)
    }
}

/// Удаляет недописанный архив, не маскируя исходную ошибку
fn remove_archive(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("[WARN] Could not remove incomplete backup file: {e}");
        }
    }
}

fn make_bar(progress: bool, len: u64, msg: &'static str) -> Option<ProgressBar> {
    if !progress {
        return None;
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n[{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(msg);
    Some(pb)
}
