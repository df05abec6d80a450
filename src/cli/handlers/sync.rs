//! Reconciles every project and writes the results back.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::{cli::handlers::commons, core::reconcile::StructureSource};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Merges every project with its parameter files and writes the result back."
)]
struct SyncArgs {
    /// Re-scan the build configuration of projects that have no items.
    #[arg(long)]
    gather_empty: bool,

    /// Delete parameter files of the storage mode that is not in use.
    #[arg(long)]
    cleanup: bool,
}

/// Entry point of `sync`.
pub fn handle(args: Vec<String>) -> Result<()> {
    let sync_args = SyncArgs::try_parse_from(&args)?;
    let mut session = commons::open_session(false)?;
    let workspace = &mut session.workspace;

    // 1. Reconcile each project and report where its structure came from.
    let ids: Vec<_> = workspace.project_infos().map(|info| info.id).collect();
    for id in ids {
        let source = workspace.update_project(id, sync_args.gather_empty)?;
        let name = workspace
            .project_info(id)
            .map(|info| info.name.clone())
            .unwrap_or_default();
        let label = match source {
            Some(StructureSource::File) => t!("sync.source.file").green(),
            Some(StructureSource::Legacy) => t!("sync.source.legacy").yellow(),
            Some(StructureSource::Scan) => t!("sync.source.scan").cyan(),
            Some(StructureSource::Empty) => t!("sync.source.empty").dimmed(),
            None => t!("sync.source.kept").normal(),
        };
        println!("  {:<24} {}", name.bold(), label);
    }

    // 2. Write everything back.
    workspace.refresh_active();
    workspace.save_all();
    if sync_args.cleanup {
        for path in workspace.cleanup_unused_files() {
            println!("  {} {}", t!("sync.deleted").red(), path.display());
        }
    }

    commons::print_warnings(workspace);
    println!("\n{} {}", t!("common.success"), t!("sync.success"));
    Ok(())
}
