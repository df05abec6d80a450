//! Deletes parameter files that belong to no loaded project.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::{cli::handlers::commons, constants::PROJECT_FILE_SUFFIX};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Deletes parameter files that no loaded project uses."
)]
struct CleanArgs {
    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,

    /// Only list what would be deleted.
    #[arg(long)]
    dry_run: bool,

    /// How deep below the solution directory to look.
    #[arg(long, short, default_value_t = 8)]
    depth: usize,
}

/// Entry point of `clean`.
pub fn handle(args: Vec<String>) -> Result<()> {
    let clean_args = CleanArgs::try_parse_from(&args)?;
    let mut session = commons::open_session(true)?;
    let workspace = &mut session.workspace;

    // 1. Files the current storage mode actually uses.
    let in_use: HashSet<PathBuf> = workspace
        .project_infos()
        .filter_map(|info| workspace.project_file(info.id))
        .collect();

    // 2. Every other parameter file below the solution directory.
    let root = workspace.store().solution_dir();
    let suffix = format!(".{}", PROJECT_FILE_SUFFIX);
    let candidates: Vec<PathBuf> = WalkDir::new(&root)
        .max_depth(clean_args.depth)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&suffix))
        })
        .filter(|path| !in_use.contains(path))
        .collect();

    if candidates.is_empty() {
        println!("{}", t!("clean.nothing").dimmed());
        return Ok(());
    }

    println!("\n{}", t!("clean.header").yellow().bold());
    for path in &candidates {
        println!("    • {}", path.display());
    }
    if clean_args.dry_run {
        return Ok(());
    }

    // 3. Confirm and delete.
    if !clean_args.yes
        && !Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("clean.prompt.are_you_sure"))
            .default(false)
            .interact()?
    {
        println!("\n{}", t!("common.info.operation_cancelled"));
        return Ok(());
    }
    for path in &candidates {
        log::debug!("Deleting unused parameter file '{}'.", path.display());
        fs::remove_file(path)
            .with_context(|| format!("Failed to delete '{}'", path.display()))?;
    }
    println!(
        "\n{} {}",
        t!("common.success"),
        format!(t!("clean.success"), count = candidates.len())
    );
    commons::print_warnings(workspace);
    Ok(())
}
