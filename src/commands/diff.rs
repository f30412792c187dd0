//! `cairn diff` — compute and print the plan without touching anything.

use std::path::Path;

use anyhow::Result;
use converge::{calculate_plan, infer_system_state, load_config, plan_entries, Host};

use crate::cli::DiffArgs;

pub fn run(host: &Host, config: &str, args: &DiffArgs) -> Result<()> {
    let desired = load_config(Path::new(config), host)?;
    let (current, _) = infer_system_state(host, false)?;
    let plan = calculate_plan(&desired, &current, host, args.prune_unmanaged)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan_entries(&plan))?);
        return Ok(());
    }

    if plan.is_empty() {
        super::print_no_changes();
        return Ok(());
    }

    println!("The following operations will be performed:");
    super::print_plan(&plan);
    Ok(())
}
