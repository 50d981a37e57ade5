// src/cli.rs
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::backup::BackupEngine;
use crate::config::{Config, Context};
use crate::exclude::ExclusionSet;
use crate::restore::{Candidate, RestoreEngine, Retention};
use crate::store::{format_table, BackupCatalog, BackupRecord, HistoryLog};

#[derive(Parser)]
#[command(
    name = "arkhiv",
    about = "arkhiv v0.1.0",
    long_about = "arkhiv v0.1.0\nVersioned local backup/restore with verified zip archives",
    version = crate::VERSION
)]
pub struct Cli {
    /// Working directory to snapshot (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Store directory name inside the working directory (overrides config)
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a verified backup of the working directory
    ///
    /// Examples:
    ///   arkhiv backup --comment "before upgrade"
    ///   arkhiv backup --progress
    #[command(name = "backup")]
    Backup {
        /// Comment for the backup (prompted for if omitted)
        #[arg(short, long)]
        comment: Option<String>,

        /// Show progress bars
        #[arg(long)]
        progress: bool,
    },

    /// Restore a backup, clearing non-kept items first
    ///
    /// Examples:
    ///   arkhiv restore 2 --keep "1 3" --yes
    ///   arkhiv restore 01__backup.zip --keep-all --yes
    #[command(name = "restore")]
    Restore {
        /// Backup to restore: archive name or 1-based list number
        target: String,

        /// Space-separated 1-based numbers of current items to KEEP
        #[arg(long, conflicts_with = "keep_all")]
        keep: Option<String>,

        /// Keep every current item (delete nothing before extraction)
        #[arg(long)]
        keep_all: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Show progress bar during extraction
        #[arg(long)]
        progress: bool,
    },

    /// List available backups, oldest first
    #[command(name = "list")]
    List {
        /// Print machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete a backup from the store
    #[command(name = "delete")]
    Delete {
        /// Backup to delete: archive name or 1-based list number
        target: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Mark a backup as bad (renames it, keeping its number)
    #[command(name = "mark-bad")]
    MarkBad {
        /// Backup to mark: archive name or 1-based list number
        target: String,
    },

    /// Manage the ignore list
    #[command(name = "ignore")]
    Ignore {
        #[command(subcommand)]
        op: IgnoreOp,
    },

    /// History log operations
    #[command(name = "log")]
    Log {
        #[command(subcommand)]
        op: LogOp,
    },
}

#[derive(Subcommand)]
pub enum IgnoreOp {
    /// Add a file or folder rule (prefix folders with '/', e.g. '/core')
    Add {
        item: String,
    },
    /// Add a size limit rule (e.g. '50MB' or '1GB')
    AddSize {
        limit: String,
    },
    /// Show all ignore rules
    Show,
}

#[derive(Subcommand)]
pub enum LogOp {
    /// Print the history log
    Show,
    /// Rewrite the log as a table of available backups
    Regenerate {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

impl Cli {
    /// Точка входа: собирает контекст и передает управление команде
    pub fn execute(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref(), &self.dir)?;
        if let Some(store) = &self.store {
            config.store_dir = store.clone();
            config.validate()?;
        }
        let ctx = Context::new(&self.dir, &config)?;
        let log = HistoryLog::new(ctx.log_path.clone());
        let exclusions = ExclusionSet::load(&ctx.ignore_path)?;

        match &self.command {
            Commands::Backup { comment, progress } => {
                self.cmd_backup(&ctx, &exclusions, &log, comment.as_deref(), *progress)
            }
            Commands::Restore {
                target,
                keep,
                keep_all,
                yes,
                progress,
            } => self.cmd_restore(
                &ctx,
                &exclusions,
                &log,
                target,
                keep.as_deref(),
                *keep_all,
                *yes,
                *progress,
            ),
            Commands::List { json } => self.cmd_list(&ctx, &log, *json),
            Commands::Delete { target, yes } => self.cmd_delete(&ctx, &log, target, *yes),
            Commands::MarkBad { target } => self.cmd_mark_bad(&ctx, &log, target),
            Commands::Ignore { op } => self.cmd_ignore(&ctx, exclusions, op),
            Commands::Log { op } => self.cmd_log(&ctx, &log, op),
        }
    }

    // ------------------------------------------------------------------------
    // Command implementations
    // ------------------------------------------------------------------------

    fn cmd_backup(
        &self,
        ctx: &Context,
        exclusions: &ExclusionSet,
        log: &HistoryLog,
        comment: Option<&str>,
        progress: bool,
    ) -> Result<()> {
        let comment = match comment {
            Some(c) => c.to_string(),
            None => prompt("Enter a comment for the backup (or press Enter to skip): ")?,
        };

        let engine = BackupEngine::new(ctx, exclusions, log);
        let outcome = engine.create(&comment, progress)?;

        println!(
            "Backup created and verified: {} ({:.2} MB, {} files)",
            outcome.record.name, outcome.record.size_mb, outcome.verified_files
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn cmd_restore(
        &self,
        ctx: &Context,
        exclusions: &ExclusionSet,
        log: &HistoryLog,
        target: &str,
        keep: Option<&str>,
        keep_all: bool,
        yes: bool,
        progress: bool,
    ) -> Result<()> {
        let catalog = BackupCatalog::new(ctx, log);
        let name = resolve_target(&catalog, target)?;

        if !yes {
            let answer = prompt(&format!(
                "Delete unselected files and folders in {} and restore from '{}'? (y/n): ",
                ctx.work_dir.display(),
                name
            ))?;
            if !answer.eq_ignore_ascii_case("y") {
                println!("Restore cancelled");
                return Ok(());
            }
        }

        // Флаги разбираем заранее; интерактивный выбор откладываем до
        // момента, когда движок покажет список кандидатов, по которому
        // пойдет удаление
        let preset = if keep_all {
            Some(Retention::KeepAll)
        } else if let Some(input) = keep {
            Some(parse_keep_indices(input)?)
        } else {
            None
        };

        let engine = RestoreEngine::new(ctx, exclusions, log);
        let report = engine.restore(
            &name,
            |candidates| {
                if let Some(retention) = preset {
                    return Ok(retention);
                }
                if candidates.is_empty() {
                    println!("No files or folders to delete in the current directory (after applying ignore list).");
                    return Ok(Retention::Keep(Vec::new()));
                }
                prompt_retention(candidates)
            },
            |path| {
                println!(
                    "Unable to delete {}. Please close any programs using it and press Enter to continue...",
                    path.display()
                );
                let mut line = String::new();
                let _ = io::stdin().read_line(&mut line);
            },
            progress,
        )?;

        if !report.deleted.is_empty() {
            println!("Deleted: {}", report.deleted.join(", "));
        }
        println!(
            "Restore completed successfully! ({} files extracted)",
            report.extracted
        );
        Ok(())
    }

    fn cmd_list(&self, ctx: &Context, log: &HistoryLog, json: bool) -> Result<()> {
        let catalog = BackupCatalog::new(ctx, log);
        let records = catalog.list()?;

        if json {
            println!("{}", serde_json::to_string_pretty(&records)?);
            return Ok(());
        }

        if records.is_empty() {
            println!("No backups found!");
            return Ok(());
        }

        println!("Available Backups:");
        println!("{}", backup_table(&records));
        Ok(())
    }

    fn cmd_delete(&self, ctx: &Context, log: &HistoryLog, target: &str, yes: bool) -> Result<()> {
        let catalog = BackupCatalog::new(ctx, log);
        let name = resolve_target(&catalog, target)?;

        if !yes {
            let answer = prompt(&format!(
                "Are you sure you want to delete backup '{name}'? (y/n): "
            ))?;
            if !answer.eq_ignore_ascii_case("y") {
                println!("Delete cancelled");
                return Ok(());
            }
        }

        catalog.delete(&name)?;
        println!("Backup {name} was successfully deleted!");
        Ok(())
    }

    fn cmd_mark_bad(&self, ctx: &Context, log: &HistoryLog, target: &str) -> Result<()> {
        let catalog = BackupCatalog::new(ctx, log);
        let name = resolve_target(&catalog, target)?;

        let new_name = catalog.mark_bad(&name)?;
        if new_name == name {
            println!("Backup is already marked as bad: {name}");
        } else {
            println!("Backup marked as bad: {new_name}");
        }
        Ok(())
    }

    fn cmd_ignore(&self, ctx: &Context, mut exclusions: ExclusionSet, op: &IgnoreOp) -> Result<()> {
        match op {
            IgnoreOp::Add { item } => {
                exclusions.add_path(item);
                exclusions.persist(&ctx.ignore_path)?;
                println!("'{item}' added to ignore list");
            }
            IgnoreOp::AddSize { limit } => {
                exclusions.add_size(limit)?;
                exclusions.persist(&ctx.ignore_path)?;
                println!("Size limit '{}' added to ignore list", limit.to_uppercase());
            }
            IgnoreOp::Show => {
                if exclusions.is_empty() {
                    println!("No files, folders, or sizes currently ignored!");
                } else {
                    let rows: Vec<Vec<String>> = exclusions
                        .entries()
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| vec![(i + 1).to_string(), item])
                        .collect();
                    println!("Ignored Files, Folders, and Sizes:");
                    println!("{}", format_table(&["#", "Item"], &rows));
                }
            }
        }
        Ok(())
    }

    fn cmd_log(&self, ctx: &Context, log: &HistoryLog, op: &LogOp) -> Result<()> {
        match op {
            LogOp::Show => {
                let content = log.read()?;
                if content.is_empty() {
                    println!("No log file found!");
                } else {
                    println!("=== Backup Log History ===");
                    println!("{content}");
                }
            }
            LogOp::Regenerate { yes } => {
                if !yes {
                    let answer = prompt(
                        "This will clear the existing log and create a new one. Continue? (y/n): ",
                    )?;
                    if !answer.eq_ignore_ascii_case("y") {
                        return Ok(());
                    }
                }

                let catalog = BackupCatalog::new(ctx, log);
                let records = catalog.list()?;
                if records.is_empty() {
                    println!("No backups found to regenerate log!");
                    return Ok(());
                }
                log.regenerate(&records)?;
                println!("Log file has been regenerated successfully!");
            }
        }
        Ok(())
    }
}

/// Таблица бэкапов: номер 1 у старейшего
fn backup_table(records: &[BackupRecord]) -> String {
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
    format_table(&["#", "Backup Name", "Created", "Comment", "Size"], &rows)
}

/// Принимает либо имя архива, либо его номер в списке (1 — старейший)
fn resolve_target(catalog: &BackupCatalog, target: &str) -> Result<String> {
    let records = catalog.list()?;

    if let Ok(index) = target.parse::<usize>() {
        if index == 0 || index > records.len() {
            return Err(anyhow!(
                "Invalid selection! Number out of range (1..={})",
                records.len()
            ));
        }
        return Ok(records[index - 1].name.clone());
    }

    if records.iter().any(|r| r.name == target) {
        return Ok(target.to_string());
    }
    Err(anyhow!("Backup not found: {target}"))
}

/// Разбирает список номеров для удержания ("1 3 5", единицы с 1)
fn parse_keep_indices(input: &str) -> Result<Retention> {
    let mut keep = Vec::new();
    for token in input.split([' ', ',']).filter(|t| !t.is_empty()) {
        let number: usize = token
            .parse()
            .map_err(|_| anyhow!("Invalid input! Please enter numbers separated by spaces."))?;
        let index = number
            .checked_sub(1)
            .ok_or_else(|| anyhow!("Invalid selection! Numbers start at 1."))?;
        keep.push(index);
    }
    Ok(Retention::Keep(keep))
}

/// Показывает кандидатов и спрашивает, что оставить. Нечисловой ввод
/// переспрашивается, ошибка stdin прерывает восстановление.
fn prompt_retention(candidates: &[Candidate]) -> crate::error::Result<Retention> {
    println!("The following files and folders are in the current directory (ignore list applied):");
    for (i, c) in candidates.iter().enumerate() {
        let kind = if c.is_dir { "Folder" } else { "File" };
        println!("{}. {} ({kind})", i + 1, c.name);
    }

    loop {
        let input = prompt(
            "Enter the numbers of the items you want to KEEP (e.g., '1 3 5'), or press Enter to delete all listed: ",
        )?;
        if input.is_empty() {
            return Ok(Retention::Keep(Vec::new()));
        }
        match parse_keep_indices(&input) {
            Ok(retention) => return Ok(retention),
            Err(e) => println!("{e}"),
        }
    }
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{msg}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
