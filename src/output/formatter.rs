use colored::Colorize;

use crate::batch::OutcomeRecord;
use crate::executor::{OutcomeStatus, ReconcileOutcome, RollbackOutcome};
use crate::resource::ResourceState;
use crate::tags::{TagDiff, TagSet};

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg.red());
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Print tags one per line, sorted by key.
pub fn print_tags(tags: &TagSet) {
    if tags.is_empty() {
        println!("  {}", "(no tags)".dimmed());
        return;
    }
    for (key, value) in tags.iter() {
        println!("  {} = {}", key.bold(), value);
    }
}

/// Print a diff in the `~ key: old -> new` style.
pub fn print_diff(diff: &TagDiff) {
    for change in &diff.changes {
        match &change.old {
            Some(old) => println!(
                "  {} {}: {} {} {}",
                "~".yellow().bold(),
                change.key.bold(),
                old.red(),
                "->".dimmed(),
                change.new.green()
            ),
            None => println!(
                "  {} {}: {}",
                "+".green().bold(),
                change.key.bold(),
                change.new.green()
            ),
        }
    }
}

pub fn print_resource(state: &ResourceState) {
    println!("{} {}", "Resource:".bold(), state.id);
    println!("  type     = {}", state.resource_type);
    if !state.location.is_empty() {
        println!("  location = {}", state.location);
    }
    println!("{}", "Tags:".bold());
    print_tags(&state.tags);
}

/// Print the result of a single-resource reconciliation.
pub fn print_outcome(outcome: &ReconcileOutcome) {
    let name = outcome.identity.resource_name();
    match &outcome.status {
        OutcomeStatus::Updated => {
            print_success(&format!("Successfully updated tags for resource '{}'.", name));
            print_diff(&outcome.diff);
        }
        OutcomeStatus::Unchanged => {
            print_success(&format!("Tags for resource '{}' are already up to date.", name));
        }
        OutcomeStatus::NotFound => {
            print_error(&format!("Resource {} not found.", outcome.identity));
        }
        OutcomeStatus::ApiVersionUnresolved => {
            print_error(&format!(
                "Could not resolve an API version for resource '{}'. Nothing was changed.",
                name
            ));
        }
        OutcomeStatus::Canceled => {
            print_warning(&format!("Update for resource '{}' was cancelled.", name));
        }
        OutcomeStatus::Failed(message) => {
            print_error(&format!(
                "Failed to update tags for resource '{}'. Error: {}",
                name, message
            ));
        }
    }
    if let Some(rollback) = &outcome.rollback {
        print_rollback(name, rollback);
    }
}

pub fn print_rollback(name: &str, outcome: &RollbackOutcome) {
    match outcome {
        RollbackOutcome::RolledBack(state) => {
            print_success(&format!("Successfully rolled back tags for resource '{}'.", name));
            print_tags(&state.tags);
        }
        RollbackOutcome::NothingToRollBack => {
            print_warning(&format!("Nothing to roll back for resource '{}'.", name));
        }
        RollbackOutcome::ApiVersionUnresolved => {
            print_error(&format!(
                "Rollback for resource '{}' failed: no API version could be resolved.",
                name
            ));
        }
        RollbackOutcome::Canceled => {
            print_warning(&format!("Rollback for resource '{}' was cancelled.", name));
        }
        RollbackOutcome::Failed(message) => {
            print_error(&format!(
                "Rollback for resource '{}' failed. Error: {}",
                name, message
            ));
        }
    }
}

/// One line per batch row.
pub fn print_record(record: &OutcomeRecord) {
    let line = if record.diff.is_empty() {
        format!("{}: {}", record.resource_name, record.status)
    } else {
        format!("{}: {} {}", record.resource_name, record.status, record.diff)
    };
    match record.status {
        OutcomeStatus::Updated | OutcomeStatus::Unchanged => print_success(&line),
        OutcomeStatus::Canceled => print_warning(&line),
        _ => print_error(&line),
    }
}
