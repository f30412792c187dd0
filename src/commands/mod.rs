pub mod apply;
pub mod diff;
pub mod dump;

use colored::Colorize;
use converge::Action;

/// Shared text rendering for plans: description line plus indented
/// execution details per action.
pub fn print_plan(plan: &[Action]) {
    for action in plan {
        println!("=> {}", action.description().bold());
        for detail in action.execution_details() {
            println!("   - {}", detail.dimmed());
        }
    }
}

pub fn print_no_changes() {
    println!();
    println!("  {} No changes needed", "✓".green());
}
