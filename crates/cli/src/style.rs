//! Terminal styling for run reports and operator messages.

use console::Style;

use revmigrate_core::WorkflowMode;

/// Green check mark followed by the message.
pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

/// Red cross followed by the message.
pub fn error(msg: &str) -> String {
    format!("{} {}", Style::new().red().apply_to("✗"), msg)
}

pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// Annotation appended to a prompt when it was answered without asking.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Mode name, colored by how many migration units the mode can produce:
/// blue for the single-unit modes, magenta for ITERATIVE.
pub fn mode(mode: WorkflowMode) -> String {
    let style = match mode {
        WorkflowMode::Iterative => Style::new().magenta().bold(),
        _ => Style::new().blue().bold(),
    };
    style.apply_to(mode.as_str()).to_string()
}
