//! Human-facing messages. Everything here goes to stderr so the child's
//! stdout stays clean.

use colored::*;

use crate::resolve::Advisory;
use crate::update::state::UpdateState;

pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

pub fn warn(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "devrunner:".cyan(), message);
}

pub fn hint(message: &str) {
    eprintln!("{} {}", "hint:".dimmed(), message.dimmed());
}

pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green(), message);
}

/// Explain why one tool won a lockfile conflict
pub fn advisory(advisory: &Advisory) {
    warn(&format!(
        "found {} as well; using {} (the only one installed)",
        advisory.superseded.join(", "),
        advisory.chosen.bold()
    ));
}

/// One-time notice after a background self-update
pub fn update_notice(state: &UpdateState) {
    eprintln!(
        "{} devrunner updated {} → {}",
        "✓".green(),
        state.previous_version.dimmed(),
        state.new_version.green().bold()
    );
    for line in state.highlights(5) {
        eprintln!("  {}", line);
    }
    if let Some(url) = &state.release_url {
        eprintln!("  {}", url.dimmed());
    }
    eprintln!();
}
