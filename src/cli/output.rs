use colored::Colorize;
use indicatif::ProgressBar;

use crate::cli::context;

/// Print a success message.
pub fn success(msg: &str) {
    if !context::quiet() {
        println!("  {} {}", "✓".green(), msg);
    }
}

/// Print a warning message.
pub fn warning(msg: &str) {
    if !context::quiet() {
        println!("  {} {}", "⚠".yellow(), msg);
    }
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a header line.
pub fn header(msg: &str) {
    if !context::quiet() {
        println!("\n{}", msg.bold());
    }
}

/// Print a dimmed detail line, only in verbose mode.
pub fn detail(msg: &str) {
    if context::verbose() && !context::quiet() {
        println!("    {}", msg.dimmed());
    }
}

/// Start a spinner for a long-running step.
pub fn spinner(msg: &str) -> ProgressBar {
    if context::quiet() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Stop a spinner and print the final message.
pub fn finish_spinner(pb: ProgressBar, msg: &str) {
    pb.finish_and_clear();
    success(msg);
}
