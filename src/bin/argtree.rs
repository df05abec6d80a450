// src/bin/argtree.rs

use anyhow::Result;
use argtree::cli::{Cli, handlers};
use clap::{CommandFactory, Parser};
use colored::*;

// --- Command Definition and Registry ---

/// A system command, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<()>,
}

/// Every action the binary knows. Adding one is a new entry here plus its handler module.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "clean",
        aliases: &[],
        handler: handlers::clean::handle,
    },
    CommandDefinition {
        name: "cmdline",
        aliases: &["cmd"],
        handler: handlers::cmdline::handle,
    },
    CommandDefinition {
        name: "env",
        aliases: &[],
        handler: handlers::env::handle,
    },
    CommandDefinition {
        name: "set",
        aliases: &["edit"],
        handler: handlers::set::handle,
    },
    CommandDefinition {
        name: "sync",
        aliases: &[],
        handler: handlers::sync::handle,
    },
    CommandDefinition {
        name: "tree",
        aliases: &["ls"],
        handler: handlers::tree::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // clap errors (including `--help` of a handler) render themselves.
        if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Routes `argtree <action> [args...]` to its handler. Without an action, prints help.
fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(action) = cli.action else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match find_command(&action) {
        Some(command) => (command.handler)(cli.args),
        None => Err(anyhow::anyhow!(unknown_action_message(&action))),
    }
}

fn unknown_action_message(action: &str) -> String {
    let known: Vec<&str> = COMMAND_REGISTRY.iter().map(|c| c.name).collect();
    format!(
        argtree::t!("error.unknown_action"),
        action = action,
        known = known.join(", ")
    )
}
