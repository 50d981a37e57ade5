// src/scan.rs
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Context;
use crate::error::Result;
use crate::exclude::ExclusionSet;

/// Файл, попавший в операцию: абсолютный путь и имя записи в архиве
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub arc_name: String,
}

/// Имя записи в архиве: компоненты пути относительно корня, соединенные
/// прямыми слэшами. Имя должно извлекаться байт в байт, поэтому имена
/// вне UTF-8 не кодируются с потерями, а дают None.
fn arc_name(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.iter().map(|c| c.to_str()).collect();
    Some(parts?.join("/"))
}

/// Собирает список файлов рабочей директории для бэкапа.
///
/// Директория хранилища и служебные файлы пропускаются всегда. Элемент
/// верхнего уровня, исключенный правилом-путем, пропускается целиком, без
/// спуска внутрь. Внутри остальных директорий каждый файл проверяется
/// независимо: по полному разрешенному пути и по лимитам размера.
/// Итоговый список отсортирован по имени записи — повторный обход
/// неизменной директории дает тот же результат.
pub fn resolve(ctx: &Context, exclusions: &ExclusionSet) -> Result<Vec<ResolvedFile>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(&ctx.work_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if ctx.skip_names.contains(&name) {
            continue;
        }

        let path = entry.path();
        if exclusions.is_path_excluded(&path, &ctx.work_dir) {
            continue;
        }

        // metadata раскрывает симлинки; битые пропускаем с предупреждением
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("[WARN] Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if metadata.is_file() {
            if !exclusions.is_size_excluded(metadata.len()) {
                match arc_name(&path, &ctx.work_dir) {
                    Some(arc) => files.push(ResolvedFile {
                        path,
                        arc_name: arc,
                    }),
                    None => {
                        eprintln!("[WARN] Skipping {}: name is not valid UTF-8", path.display())
                    }
                }
            }
        } else if metadata.is_dir() {
            collect_dir(&path, ctx, exclusions, &mut files);
        }
    }

    files.sort_by(|a, b| a.arc_name.cmp(&b.arc_name));
    Ok(files)
}

/// Рекурсивно собирает файлы директории с поштучными проверками
fn collect_dir(
    dir: &Path,
    ctx: &Context,
    exclusions: &ExclusionSet,
    files: &mut Vec<ResolvedFile>,
) {
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Директории сами по себе в архив не попадают
        if !path.is_file() {
            continue;
        }

        if exclusions.is_path_excluded(path, &ctx.work_dir) {
            continue;
        }

        let size = match fs::metadata(path) {
            Ok(m) => m.len(),
            Err(e) => {
                eprintln!("[WARN] Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if exclusions.is_size_excluded(size) {
            continue;
        }

        match arc_name(path, &ctx.work_dir) {
            Some(arc) => files.push(ResolvedFile {
                path: path.to_path_buf(),
                arc_name: arc,
            }),
            None => eprintln!("[WARN] Skipping {}: name is not valid UTF-8", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    fn make_ctx(root: &Path) -> Context {
        Context::new(root, &Config::default()).unwrap()
    }

    fn arc_names(files: &[ResolvedFile]) -> Vec<&str> {
        files.iter().map(|f| f.arc_name.as_str()).collect()
    }

    #[test]
    fn test_resolve_skips_store_dir() {
        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());
        fs::write(ctx.work_dir.join("a.txt"), "a").unwrap();
        fs::write(ctx.store_dir.join("01__backup.zip"), "zip").unwrap();

        let files = resolve(&ctx, &ExclusionSet::new()).unwrap();
        assert_eq!(arc_names(&files), vec!["a.txt"]);
    }

    #[test]
    fn test_resolve_recurses_and_sorts() {
        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());
        fs::create_dir_all(ctx.work_dir.join("docs/inner")).unwrap();
        fs::write(ctx.work_dir.join("docs/inner/deep.txt"), "d").unwrap();
        fs::write(ctx.work_dir.join("docs/b.txt"), "b").unwrap();
        fs::write(ctx.work_dir.join("a.txt"), "a").unwrap();

        let files = resolve(&ctx, &ExclusionSet::new()).unwrap();
        assert_eq!(
            arc_names(&files),
            vec!["a.txt", "docs/b.txt", "docs/inner/deep.txt"]
        );
    }

    #[test]
    fn test_excluded_dir_skipped_wholesale() {
        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());
        fs::create_dir(ctx.work_dir.join("core")).unwrap();
        fs::write(ctx.work_dir.join("core/hidden.txt"), "h").unwrap();
        fs::write(ctx.work_dir.join("keep.txt"), "k").unwrap();

        let mut excl = ExclusionSet::new();
        excl.add_path("/core");

        let files = resolve(&ctx, &excl).unwrap();
        assert_eq!(arc_names(&files), vec!["keep.txt"]);
    }

    #[test]
    fn test_nested_file_excluded_by_full_path() {
        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());
        fs::create_dir(ctx.work_dir.join("docs")).unwrap();
        fs::write(ctx.work_dir.join("docs/secret.txt"), "s").unwrap();
        fs::write(ctx.work_dir.join("docs/open.txt"), "o").unwrap();

        let mut excl = ExclusionSet::new();
        excl.add_path("/docs/secret.txt");

        let files = resolve(&ctx, &excl).unwrap();
        assert_eq!(arc_names(&files), vec!["docs/open.txt"]);
    }

    #[test]
    fn test_size_rule_applies_everywhere() {
        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());
        fs::create_dir(ctx.work_dir.join("data")).unwrap();
        fs::write(ctx.work_dir.join("big.bin"), vec![0u8; 2 * 1024 * 1024]).unwrap();
        fs::write(ctx.work_dir.join("data/big2.bin"), vec![0u8; 2 * 1024 * 1024]).unwrap();
        fs::write(ctx.work_dir.join("small.txt"), "s").unwrap();

        let mut excl = ExclusionSet::new();
        excl.add_size("1MB").unwrap();

        let files = resolve(&ctx, &excl).unwrap();
        assert_eq!(arc_names(&files), vec!["small.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());
        fs::write(ctx.work_dir.join("good.txt"), "g").unwrap();
        fs::write(ctx.work_dir.join(OsStr::from_bytes(b"bad_\xff.txt")), "b").unwrap();

        let files = resolve(&ctx, &ExclusionSet::new()).unwrap();
        assert_eq!(arc_names(&files), vec!["good.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_backslash_in_name_kept_verbatim() {
        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());
        fs::write(ctx.work_dir.join("a\\b.txt"), "x").unwrap();

        let files = resolve(&ctx, &ExclusionSet::new()).unwrap();
        assert_eq!(arc_names(&files), vec!["a\\b.txt"]);
    }

    #[test]
    fn test_empty_dir_resolves_empty() {
        let temp = tempdir().unwrap();
        let ctx = make_ctx(temp.path());

        let files = resolve(&ctx, &ExclusionSet::new()).unwrap();
        assert!(files.is_empty());
    }
}
