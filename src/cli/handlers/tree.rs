use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::{args::LaunchArgs, handlers::commons},
    core::graph_display::{self, DisplayOptions},
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Displays the parameter tree of every project."
)]
struct TreeArgs {
    /// Only show this project (id, name or unique name).
    project: Option<String>,

    /// Show the id of every node.
    #[arg(long, short)]
    ids: bool,

    /// Also show projects hidden from the list.
    #[arg(long, short)]
    all: bool,

    /// Limit the depth of the tree display.
    #[arg(long, short)]
    depth: Option<usize>,

    #[command(flatten)]
    launch: LaunchArgs,
}

/// Renders the tree of every project, or of one.
pub fn handle(args: Vec<String>) -> Result<()> {
    // 1. Parse this handler's specific arguments.
    let tree_args = TreeArgs::try_parse_from(&args)?;

    // 2. Load and resolve under the requested launch context.
    let mut session = commons::open_session(true)?;
    let workspace = &mut session.workspace;
    workspace.set_launch_context(tree_args.launch.to_context());
    workspace.refresh_active();

    let only = match tree_args.project.as_deref() {
        Some(query) => Some(commons::resolve_project(workspace, Some(query))?),
        None => None,
    };

    // 3. Render.
    let options = DisplayOptions {
        show_ids: tree_args.ids,
        show_hidden: tree_args.all,
        max_depth: tree_args.depth,
    };
    let rendered = graph_display::render_tree(workspace.tree(), only, &options);
    println!(
        "\n{}",
        format!(
            t!("tree.header"),
            solution = workspace.solution_path().display()
        )
        .bold()
    );
    if rendered.is_empty() {
        println!("{}", t!("tree.empty").dimmed());
    } else {
        print!("{}", rendered);
    }
    commons::print_warnings(workspace);
    Ok(())
}
