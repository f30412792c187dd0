//! Transactional plan execution.
//!
//! Actions run sequentially in plan order. The first apply failure
//! triggers a best-effort rollback of every previously completed action
//! in reverse order, and the original apply error is surfaced to the
//! caller. Rollback failures are logged and never halt the sweep.

use crate::action::Action;
use crate::error::Result;
use crate::host::Host;

pub fn execute_plan(plan: &mut [Action], host: &Host) -> Result<()> {
    let mut completed = 0usize;

    for index in 0..plan.len() {
        log::info!("=> {}", plan[index].description());
        if let Err(err) = plan[index].apply(host) {
            log::error!("Action '{}' failed: {err}; rolling back changes", plan[index].description());
            rollback_completed(&plan[..completed], host);
            return Err(err);
        }
        completed = index + 1;
    }

    log::info!("Apply complete.");
    Ok(())
}

fn rollback_completed(completed: &[Action], host: &Host) {
    log::info!("--- Starting Rollback ---");
    for action in completed.iter().rev() {
        log::info!("<= Rolling back: {}", action.description());
        // Each rollback logs its own failure; the sweep always continues.
        let _ = action.rollback(host);
    }
    log::info!("--- Rollback Complete ---");
}
