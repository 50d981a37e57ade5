// src/restore.rs
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::archive::ArchiveReader;
use crate::config::Context;
use crate::error::{BackupError, Result};
use crate::exclude::ExclusionSet;
use crate::store::HistoryLog;

/// Элемент рабочей директории — кандидат на удаление перед восстановлением
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub is_dir: bool,
}

/// Решение вызывающей стороны: что из кандидатов оставить.
/// Keep содержит индексы (с нуля) в списке кандидатов; остальные
/// элементы списка удаляются.
#[derive(Debug, Clone)]
pub enum Retention {
    KeepAll,
    Keep(Vec<usize>),
}

/// Итог восстановления
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub deleted: Vec<String>,
    pub extracted: usize,
}

/// Движок восстановления: очистка рабочей директории по решению
/// вызывающей стороны и извлечение архива поверх нее.
///
/// Фаза удаления не транзакционна: уже удаленные элементы остаются
/// удаленными, даже если последующее удаление или извлечение упадет.
pub struct RestoreEngine<'a> {
    ctx: &'a Context,
    exclusions: &'a ExclusionSet,
    log: &'a HistoryLog,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(ctx: &'a Context, exclusions: &'a ExclusionSet, log: &'a HistoryLog) -> Self {
        Self {
            ctx,
            exclusions,
            log,
        }
    }

    /// Текущие элементы верхнего уровня рабочей директории, без хранилища
    /// и служебных файлов. Список отфильтрован правилами игнорирования:
    /// игнорируемые элементы никогда не были частью бэкапа, поэтому на
    /// удаление не предлагаются и остаются нетронутыми.
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        let mut items = Vec::new();

        for entry in fs::read_dir(&self.ctx.work_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if self.ctx.skip_names.contains(&name) {
                continue;
            }

            let path = entry.path();
            if self.exclusions.is_path_excluded(&path, &self.ctx.work_dir) {
                continue;
            }

            items.push(Candidate {
                is_dir: path.is_dir(),
                name,
            });
        }

        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    /// Восстанавливает архив. `decide` получает список кандидатов,
    /// собранный непосредственно перед фазой удаления, и возвращает
    /// решение об удержании — индексы решения всегда относятся к тому
    /// списку, по которому пойдет удаление. `pause` вызывается при
    /// отказе в доступе во время удаления, после подтверждения удаление
    /// повторяется один раз.
    pub fn restore<D, P>(
        &self,
        name: &str,
        decide: D,
        mut pause: P,
        progress: bool,
    ) -> Result<RestoreReport>
    where
        D: FnOnce(&[Candidate]) -> Result<Retention>,
        P: FnMut(&Path),
    {
        // Архив открываем до каких-либо удалений: отсутствующий или
        // нечитаемый архив не должен стоить текущих данных
        let mut reader = ArchiveReader::open(&self.ctx.archive_path(name))?;

        let candidates = self.candidates()?;
        let to_delete = select_for_deletion(&candidates, decide(&candidates)?)?;

        let mut deleted = Vec::new();
        for candidate in to_delete {
            let path = self.ctx.work_dir.join(&candidate.name);
            self.delete_item(&path, candidate.is_dir, &mut pause)?;
            deleted.push(candidate.name.clone());
        }

        // Извлечение поверх рабочей директории; ошибка прерывает
        // восстановление, оставляя частично извлеченные файлы
        let pb = make_bar(progress, reader.len() as u64);
        let mut extracted = 0;
        reader.extract_all(&self.ctx.work_dir, |_| {
            extracted += 1;
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
        })?;
        if let Some(pb) = pb {
            pb.finish_with_message("Restore completed");
        }

        let deleted_list = if deleted.is_empty() {
            "None".to_string()
        } else {
            deleted.join(", ")
        };
        self.log
            .append(&format!("{name} - Restored (Deleted items: {deleted_list})"));

        Ok(RestoreReport { deleted, extracted })
    }

    /// Удаляет файл или директорию. Отказ в доступе повторяется один раз
    /// после паузы с подтверждением; вторая неудача фатальна.
    fn delete_item<P>(&self, path: &Path, is_dir: bool, pause: &mut P) -> Result<()>
    where
        P: FnMut(&Path),
    {
        delete_with_retry(path, |p| remove_path(p, is_dir), pause)
    }
}

/// Удаление с одной повторной попыткой: отказ в доступе дает вызывающей
/// стороне шанс освободить путь, любая другая ошибка фатальна сразу
fn delete_with_retry<R, P>(path: &Path, mut remove: R, pause: &mut P) -> Result<()>
where
    R: FnMut(&Path) -> std::io::Result<()>,
    P: FnMut(&Path),
{
    match remove(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            pause(path);
            remove(path).map_err(|source| BackupError::Deletion {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(BackupError::Deletion {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// По решению об удержании возвращает кандидатов на удаление.
/// Индекс вне диапазона отменяет восстановление до первого удаления.
fn select_for_deletion(candidates: &[Candidate], retention: Retention) -> Result<Vec<&Candidate>> {
    match retention {
        Retention::KeepAll => Ok(Vec::new()),
        Retention::Keep(keep) => {
            for &index in &keep {
                if index >= candidates.len() {
                    return Err(BackupError::InvalidSelection {
                        index: index + 1,
                        len: candidates.len(),
                    });
                }
            }
            Ok(candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| !keep.contains(i))
                .map(|(_, c)| c)
                .collect())
        }
    }
}

fn remove_path(path: &Path, is_dir: bool) -> std::io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn make_bar(progress: bool, len: u64) -> Option<ProgressBar> {
    if !progress {
        return None;
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Restoring backup\n[{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    Some(pb)
}
