// src/store.rs
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Context;
use crate::error::Result;

/// Маркер, вставляемый в комментарий испорченного бэкапа
const BAD_MARKER: &str = "[BAD-ERROR]_";

/// Запись о бэкапе в хранилище. Идентичность — имя файла архива;
/// порядковые номера никогда не переиспользуются.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    /// Имя файла архива, например "03__before_upgrade.zip"
    pub name: String,

    /// Порядковый номер (двузначный префикс имени)
    pub seq: u32,

    /// Комментарий из имени файла
    pub comment: String,

    /// Время создания (mtime файла архива)
    pub created: DateTime<Local>,

    /// Размер в мегабайтах, округленный до сотых
    pub size_mb: f64,
}

/// Размер в мегабайтах, округленный до двух знаков (только для показа,
/// сравнения с лимитами идут без округления)
pub fn size_mb_rounded(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

/// Разбирает имя архива "NN__comment.zip" на номер и комментарий
fn parse_archive_name(name: &str) -> (u32, String) {
    let stem = name.strip_suffix(".zip").unwrap_or(name);
    match stem.split_once("__") {
        Some((prefix, comment)) => (prefix.parse().unwrap_or(0), comment.to_string()),
        None => (0, String::new()),
    }
}

/// Собирает имя архива из номера и комментария. Пробелы в комментарии
/// заменяются подчеркиваниями, пустой комментарий становится "backup".
pub fn build_archive_name(seq: u32, comment: &str) -> String {
    let comment = comment.trim();
    let formatted = if comment.is_empty() {
        "backup".to_string()
    } else {
        comment.replace(' ', "_")
    };
    format!("{seq:02}__{formatted}.zip")
}

/// Каталог архивов в директории хранилища
pub struct BackupCatalog<'a> {
    ctx: &'a Context,
    log: &'a HistoryLog,
}

impl<'a> BackupCatalog<'a> {
    pub fn new(ctx: &'a Context, log: &'a HistoryLog) -> Self {
        Self { ctx, log }
    }

    /// Все архивы хранилища, отсортированные по времени создания
    /// (старейший первым — в таблицах он получает номер 1).
    /// Пустое или отсутствующее хранилище дает пустой список.
    pub fn list(&self) -> Result<Vec<BackupRecord>> {
        let mut records = Vec::new();
        if !self.ctx.store_dir.exists() {
            return Ok(records);
        }

        for entry in fs::read_dir(&self.ctx.store_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "zip").unwrap_or(false) {
                match record_from_path(&path) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        eprintln!("[WARN] Skipping {}: {}", path.display(), e);
                    }
                }
            }
        }

        records.sort_by(|a, b| a.created.cmp(&b.created).then(a.name.cmp(&b.name)));
        Ok(records)
    }

    /// Следующий порядковый номер: максимум когда-либо выданных + 1.
    /// Помимо файлов хранилища учитываются имена архивов из журнала,
    /// иначе удаление старшего бэкапа вернуло бы его номер в оборот.
    /// Нумерация с 1, пропуски допустимы.
    pub fn next_sequence(&self) -> Result<u32> {
        let mut max = self.list()?.iter().map(|r| r.seq).max().unwrap_or(0);

        for line in self.log.read()?.lines() {
            for token in line.split_whitespace() {
                if token.ends_with(".zip") {
                    let (seq, _) = parse_archive_name(token);
                    max = max.max(seq);
                }
            }
        }
        Ok(max + 1)
    }

    /// Удаляет архив из хранилища и отмечает это в журнале
    pub fn delete(&self, name: &str) -> Result<()> {
        fs::remove_file(self.ctx.archive_path(name))?;
        self.log.append(&format!("{name} - Deleted"));
        Ok(())
    }

    /// Помечает бэкап как испорченный, вставляя маркер в комментарий и
    /// сохраняя номерной префикс. Повторный вызов ничего не меняет.
    pub fn mark_bad(&self, name: &str) -> Result<String> {
        let stem = name.strip_suffix(".zip").unwrap_or(name);
        let (prefix, comment) = match stem.split_once("__") {
            Some((p, c)) => (p, c),
            None => (stem, "backup"),
        };

        if comment.starts_with(BAD_MARKER) {
            return Ok(name.to_string());
        }

        let new_name = format!("{prefix}__{BAD_MARKER}{comment}.zip");
        fs::rename(self.ctx.archive_path(name), self.ctx.archive_path(&new_name))?;
        self.log.append(&format!("Marked as bad: {name} -> {new_name}"));
        Ok(new_name)
    }
}

/// Читает запись о бэкапе из метаданных файла архива
fn record_from_path(path: &Path) -> Result<BackupRecord> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (seq, comment) = parse_archive_name(&name);
    let metadata = fs::metadata(path)?;

    Ok(BackupRecord {
        name,
        seq,
        comment,
        created: DateTime::<Local>::from(metadata.modified()?),
        size_mb: size_mb_rounded(metadata.len()),
    })
}

/// Журнал истории: человекочитаемые строки с отметкой времени,
/// только добавление в конец
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Дописывает строку в журнал. Сбой записи не фатален для операции,
    /// которую он фиксирует, — только предупреждение.
    pub fn append(&self, msg: &str) {
        if let Err(e) = self.try_append(msg) {
            eprintln!("[WARN] Failed to write history log: {e}");
        }
    }

    fn try_append(&self, msg: &str) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} - {}", Local::now().format("%Y-%m-%d %H:%M:%S"), msg)
    }

    /// Содержимое журнала целиком (для показа)
    pub fn read(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        Ok(fs::read_to_string(&self.path)?)
    }

    /// Перезаписывает журнал таблицей доступных бэкапов
    pub fn regenerate(&self, records: &[BackupRecord]) -> Result<()> {
        let rows: Vec<Vec<String>> = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                vec![
                    (i + 1).to_string(),
                    r.name.clone(),
                    r.created.format("%Y-%m-%d %H:%M").to_string(),
                    r.comment.clone(),
                    format!("{:.2} MB", r.size_mb),
                ]
            })
            .collect();

        let table = format_table(&["#", "Backup Name", "Created", "Comment", "Size"], &rows);
        fs::write(&self.path, format!("Available Backups:\n{table}\n"))?;
        Ok(())
    }
}

/// Простая ASCII-таблица с центрированными ячейками
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|row| row.get(i).map(|c| c.len()).unwrap_or(0))
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or(0)
                + 2
        })
        .collect();

    let h_line: String = format!(
        "+{}+",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("+")
    );
    let render_row = |cells: &[String]| -> String {
        let body: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:^w$}", w = *w))
            .collect();
        format!("|{}|", body.join("|"))
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut lines = vec![h_line.clone(), render_row(&header_cells)];
    for row in rows {
        lines.push(h_line.clone());
        lines.push(render_row(row));
    }
    lines.push(h_line);
    lines.join("\n")
}
