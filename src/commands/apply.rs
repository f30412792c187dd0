//! `cairn apply` — execute the plan transactionally, or preview it with
//! `--dry-run`.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use converge::{calculate_plan, execute_plan, infer_system_state, load_config, plan_entries, Host};
use dialoguer::Confirm;

use crate::cli::ApplyArgs;

pub fn run(host: &Host, config: &str, args: &ApplyArgs) -> Result<()> {
    let desired = load_config(Path::new(config), host)?;
    let (current, _) = infer_system_state(host, false)?;
    let mut plan = calculate_plan(&desired, &current, host, args.prune_unmanaged)?;

    if args.dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan_entries(&plan))?);
        } else {
            println!("Dry run enabled. The following operations would be performed:");
            super::print_plan(&plan);
        }
        return Ok(());
    }

    if plan.is_empty() {
        super::print_no_changes();
        return Ok(());
    }

    println!("The following operations will be performed:");
    super::print_plan(&plan);

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Continue?")
            .default(true)
            .interact()?;
        if !confirmed {
            println!();
            println!("  {} Aborted", "✗".red());
            return Ok(());
        }
    }

    execute_plan(&mut plan, host)?;

    println!();
    println!("  {} Configuration applied successfully!", "✓".green().bold());
    Ok(())
}
