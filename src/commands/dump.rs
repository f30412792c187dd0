//! `cairn dump` — print the inferred current state as YAML or JSON,
//! optionally reporting which files were ignored and why, or previewing
//! what a config's ignore patterns would match.

use std::path::Path;

use anyhow::Result;
use converge::{infer_system_state, load_config, Host};

use crate::cli::DumpArgs;

pub fn run(host: &Host, args: &DumpArgs) -> Result<()> {
    if let Some(config) = &args.preview_ignores {
        return preview_ignores(host, config);
    }

    let (mut state, ignored) = infer_system_state(host, args.raw)?;

    // Disabled services with no runlevel are noise for most dumps.
    if !args.all_services {
        state.services.retain(|s| s.enabled || !s.runlevel.is_empty());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", serde_yaml::to_string(&state)?);
    }

    if args.show_ignored && !ignored.is_empty() {
        println!();
        println!("# Ignored files:");
        for entry in &ignored {
            println!("#   {} ({})", entry.path, entry.reason);
        }
    }

    if args.raw {
        println!();
        println!("# Warning: --raw mode suppresses the ignored-file report");
    }

    Ok(())
}

/// Load `config` and report which files currently drifting on the
/// system its ignore patterns would match.
fn preview_ignores(host: &Host, config: &str) -> Result<()> {
    let cfg = load_config(Path::new(config), host)?;
    let (state, _) = infer_system_state(host, true)?;

    let would_ignore: Vec<&str> = state
        .configs
        .iter()
        .filter(|c| {
            cfg.ignored_configs
                .iter()
                .any(|pattern| converge::glob::matches_glob(pattern, &c.path))
        })
        .map(|c| c.path.as_str())
        .collect();

    println!("Files that would be ignored by {config}:");
    if would_ignore.is_empty() {
        println!("  (none)");
    } else {
        for path in would_ignore {
            println!("  {path}");
        }
    }

    Ok(())
}
