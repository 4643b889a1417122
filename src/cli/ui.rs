use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an ISK amount with thousands separators and two decimals.
pub fn format_isk(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Right-aligned amount, green for income and red for expenses.
pub fn amount_cell(value: f64) -> Cell {
    let cell = Cell::new(format_isk(value)).set_alignment(CellAlignment::Right);
    if value > 0.0 {
        cell.fg(Color::Green)
    } else if value < 0.0 {
        cell.fg(Color::Red)
    } else {
        cell.fg(Color::DarkGrey)
    }
}

/// Bold amount cell for total rows.
pub fn total_cell(value: f64) -> Cell {
    amount_cell(value).add_attribute(Attribute::Bold)
}

/// Creates a spinner shown while reports are fetched.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) =
        ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed_precise}]")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
