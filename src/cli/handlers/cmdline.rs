use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::cli::{args::LaunchArgs, handlers::commons};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Prints the command line a project would be launched with."
)]
struct CmdlineArgs {
    /// The project (id, name or unique name). Defaults to the startup project.
    project: Option<String>,

    /// Also print the working directory and launch program.
    #[arg(long, short)]
    full: bool,

    #[command(flatten)]
    launch: LaunchArgs,
}

/// Prints the composed command line of a project; `--full` adds the launch details.
pub fn handle(args: Vec<String>) -> Result<()> {
    let cmd_args = CmdlineArgs::try_parse_from(&args)?;
    let mut session = commons::open_session(true)?;
    let workspace = &mut session.workspace;
    workspace.set_launch_context(cmd_args.launch.to_context());

    let project = commons::resolve_project(workspace, cmd_args.project.as_deref())?;
    if !cmd_args.full {
        println!("{}", workspace.command_line(project)?);
        commons::print_warnings(workspace);
        return Ok(());
    }

    let launch = workspace.launch(project)?;
    let unset = t!("cmdline.unset").dimmed().to_string();
    println!("{:<12} {}", t!("cmdline.label.args").bold(), launch.args);
    println!(
        "{:<12} {}",
        t!("cmdline.label.work_dir").bold(),
        launch.work_dir.as_deref().unwrap_or(&unset)
    );
    println!(
        "{:<12} {}",
        t!("cmdline.label.launch_app").bold(),
        launch.launch_app.as_deref().unwrap_or(&unset)
    );
    for (name, value) in &launch.env {
        println!("{:<12} {}={}", t!("cmdline.label.env").bold(), name, value);
    }
    commons::print_warnings(workspace);
    Ok(())
}
