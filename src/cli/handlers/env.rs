use anyhow::Result;
use clap::Parser;

use crate::cli::{
    args::{EnvFormat, LaunchArgs},
    handlers::commons,
};
use crate::core::composer;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Prints the environment variables a project would be launched with."
)]
struct EnvArgs {
    /// The project (id, name or unique name). Defaults to the startup project.
    project: Option<String>,

    /// Output format.
    #[arg(long, short, value_enum, default_value_t = EnvFormat::List)]
    format: EnvFormat,

    #[command(flatten)]
    launch: LaunchArgs,
}

/// Prints the composed environment, optionally as a shell script.
pub fn handle(args: Vec<String>) -> Result<()> {
    let env_args = EnvArgs::try_parse_from(&args)?;
    let mut session = commons::open_session(true)?;
    let workspace = &mut session.workspace;
    workspace.set_launch_context(env_args.launch.to_context());

    let project = commons::resolve_project(workspace, env_args.project.as_deref())?;
    let env = workspace.environment(project)?;
    match env_args.format.shell() {
        Some(shell) => println!("{}", composer::export_env(&env, shell)),
        None => {
            for (name, value) in &env {
                println!("{}={}", name, value);
            }
        }
    }
    commons::print_warnings(workspace);
    Ok(())
}
