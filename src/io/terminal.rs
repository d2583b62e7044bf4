//! Plain-text rendering of display fields for the terminal

use crate::domain::display::{DisplayField, FieldValue, Section, Severity};
use crossterm::style::{style, Stylize};
use std::fmt::Write;

const INDENT: &str = "  ";

fn styled_status(text: &str, severity: Severity, color: bool) -> String {
    if !color {
        return format!("[{text}]");
    }
    match severity {
        Severity::Positive => style(text).green().to_string(),
        Severity::Negative => style(text).red().to_string(),
        Severity::Neutral => style(text).yellow().to_string(),
        Severity::Unknown => style(text).dark_grey().to_string(),
    }
}

fn styled_value(field: &DisplayField, color: bool) -> String {
    match (&field.value, field.severity) {
        (FieldValue::Text(text), Some(severity)) => styled_status(text, severity, color),
        (FieldValue::Text(text), None) => text.clone(),
        (FieldValue::Labels(labels), _) => {
            labels.iter().map(|l| format!("[{l}]")).collect::<Vec<_>>().join(" ")
        }
    }
}

fn heading(section: &Section, color: bool) -> String {
    let title = section.title();
    if color {
        style(title).bold().to_string()
    } else {
        title
    }
}

/// Render fields grouped under section headings, in the given order
pub fn render(fields: &[DisplayField], color: bool) -> String {
    let mut output = String::with_capacity(fields.len() * 48);
    let mut current: Option<Section> = None;

    for field in fields {
        let depth = field.section.depth();
        if current != Some(field.section) {
            if current.is_some() && depth == 0 {
                output.push('\n');
            }
            let _ = writeln!(output, "{}{}", INDENT.repeat(depth), heading(&field.section, color));
            current = Some(field.section);
        }
        let _ = writeln!(
            output,
            "{}{}: {}",
            INDENT.repeat(depth + 1),
            field.label,
            styled_value(field, color)
        );
    }

    output
}
