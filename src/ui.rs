use console::{strip_ansi_codes, Term};
use owo_colors::OwoColorize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use std::default::Default;

use branchdesk_protocol::common::{DataOrigin, TransactionStatus};

use crate::listing::Page;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Terminal output helpers
pub struct UI {
    term: Term,
}

impl UI {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Helper method to conditionally apply color based on terminal support
    fn colorize<F>(&self, text: &str, color_fn: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if self.supports_color() {
            color_fn(text)
        } else {
            text.to_string()
        }
    }

    /// Print a success message (color only if supported)
    pub fn success(&self, message: &str) {
        let output = self.colorize(message, |m| m.green().bold().to_string());
        println!("{}", output);
    }

    /// Print an error message (color only if supported)
    pub fn error(&self, message: &str) {
        let output = self.colorize(message, |m| m.red().bold().to_string());
        eprintln!("{}", output);
    }

    /// Print a warning message (color only if supported)
    pub fn warning(&self, message: &str) {
        let output = self.colorize(message, |m| m.yellow().bold().to_string());
        println!("{}", output);
    }

    /// Print an info message (color only if supported)
    pub fn info(&self, message: &str) {
        let output = self.colorize(message, |m| m.blue().bold().to_string());
        println!("{}", output);
    }

    pub fn format_auth_status(&self, authenticated: bool) -> String {
        if authenticated {
            self.colorize("Logged in", |t| t.green().to_string())
        } else {
            self.colorize("Not logged in", |t| t.red().to_string())
        }
    }

    pub fn format_server_status(&self, connected: bool) -> String {
        if connected {
            self.colorize("Reachable", |t| t.green().to_string())
        } else {
            self.colorize("Unreachable", |t| t.red().to_string())
        }
    }

    /// Fixture data is always flagged so it is never mistaken for live rows
    pub fn format_origin(&self, origin: DataOrigin) -> String {
        match origin {
            DataOrigin::Live => self.colorize("live", |t| t.green().to_string()),
            DataOrigin::Fixture => {
                self.colorize("fixture (offline demo data)", |t| t.yellow().bold().to_string())
            }
        }
    }

    pub fn format_transaction_status(&self, status: &TransactionStatus) -> String {
        let text = status.as_str();
        match status {
            TransactionStatus::Completed => self.colorize(text, |t| t.green().to_string()),
            TransactionStatus::Pending => self.colorize(text, |t| t.yellow().to_string()),
            TransactionStatus::Failed => self.colorize(text, |t| t.red().to_string()),
            TransactionStatus::Other(_) => self.colorize(text, |t| t.dimmed().to_string()),
        }
    }

    /// Format optional field with fallback for missing data
    pub fn format_field(&self, value: Option<&str>) -> String {
        value.unwrap_or("-").to_string()
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        let term_width = self.width();
        let title_len = title.width() + 4; // 2 spaces on each side
        let line_len = if term_width > title_len {
            (term_width - title_len) / 2
        } else {
            0
        };

        let line = "═".repeat(line_len.min(30));

        println!();
        if self.supports_color() {
            println!("{} {} {}", line.cyan(), title.cyan().bold(), line.cyan());
        } else {
            println!("{} {} {}", line, title, line);
        }
        println!();
    }

    /// Create a card-style display for information
    pub fn card(&self, title: &str, content: Vec<(&str, String)>) {
        let term_width = self.width();
        let card_width = term_width
            .saturating_sub(4) // Leave more space for terminal margins
            .clamp(50, 80); // Minimum and maximum width

        let supports_color = self.supports_color();

        // Card header
        println!("╭{}╮", "─".repeat(card_width - 2));
        let title_width = title.width();
        let title_spaces = card_width.saturating_sub(title_width + 4);
        if supports_color {
            println!("│ {} {}│", title.cyan().bold(), " ".repeat(title_spaces));
        } else {
            println!("│ {} {}│", title, " ".repeat(title_spaces));
        }
        println!("├{}┤", "─".repeat(card_width - 2));

        // Card content
        for (label, value) in content {
            let label_width = strip_ansi_codes(label).width();
            let room = card_width.saturating_sub(label_width + 5);
            let value = truncate_to_width(&value, room);
            let value_width = strip_ansi_codes(&value).width();
            let content_width = label_width + value_width + 4; // ": " + 2 spaces padding

            let spaces = if content_width < card_width - 1 {
                card_width - content_width - 1
            } else {
                1 // At least one space
            };

            if supports_color {
                println!("│ {}: {}{}│", label.dimmed(), value, " ".repeat(spaces));
            } else {
                println!("│ {}: {}{}│", label, value, " ".repeat(spaces));
            }
        }

        // Card footer
        println!("╰{}╯", "─".repeat(card_width - 2));
        println!();
    }

    /// Print rows under a header, each column sized to its widest cell up
    /// to a fixed cap
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        const MAX_COLUMN: usize = 36;

        let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(strip_ansi_codes(cell).width().min(MAX_COLUMN));
            }
        }

        let render = |cells: Vec<String>| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| pad_to_width(&truncate_to_width(cell, *width), *width))
                .collect::<Vec<_>>()
                .join("  ")
        };

        let header = render(headers.iter().map(|h| h.to_string()).collect());
        if self.supports_color() {
            println!("{}", header.bold());
        } else {
            println!("{}", header);
        }
        let rule: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        println!("{}", "─".repeat(rule));

        for row in rows {
            println!("{}", render(row.clone()));
        }
    }

    /// "Showing 11-20 of 23 (page 2/3)"
    pub fn pagination_footer<T>(&self, page: &Page<T>) {
        let last = page.first_index() + page.items.len().saturating_sub(1);
        let text = if page.total_items == 0 {
            "No records".to_string()
        } else {
            format!(
                "Showing {}-{} of {} (page {}/{})",
                page.first_index(),
                last,
                page.total_items,
                page.page,
                page.total_pages
            )
        };
        println!();
        println!("{}", self.colorize(&text, |t| t.dimmed().to_string()));
    }

    /// Get terminal width for responsive layout
    pub fn width(&self) -> usize {
        self.term.size().1 as usize
    }

    /// Check if terminal supports color
    pub fn supports_color(&self) -> bool {
        self.term.features().colors_supported()
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` to at most `max` display columns, marking the cut with an
/// ellipsis. Color codes are dropped from cut values.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    let plain = strip_ansi_codes(text);
    if plain.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in plain.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn pad_to_width(text: &str, width: usize) -> String {
    let visible = strip_ansi_codes(text).width();
    format!("{}{}", text, " ".repeat(width.saturating_sub(visible)))
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format file size in a human readable way with colors (if supported)
pub fn format_size_colored(bytes: u64) -> String {
    let formatted = format_bytes(bytes);
    let supports_color = Term::stdout().features().colors_supported();

    if supports_color {
        if bytes < MB {
            formatted.green().to_string()
        } else if bytes < GB {
            formatted.yellow().to_string()
        } else {
            formatted.red().to_string()
        }
    } else {
        formatted
    }
}

/// Spinner for transfers whose size is unknown up front
pub fn create_spinner(message: &str) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new_spinner();
    let style = indicatif::ProgressStyle::default_spinner()
        .template("{spinner:.cyan} [{elapsed_precise:.dim}] {msg}")
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_to_width("Algebra", 10), "Algebra");
        assert_eq!(truncate_to_width("Computer Science", 8), "Compute…");
        assert_eq!(truncate_to_width("数学数学", 5), "数学…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn padding_ignores_color_codes() {
        let padded = pad_to_width("\u{1b}[32mok\u{1b}[0m", 4);
        assert_eq!(strip_ansi_codes(&padded).width(), 4);
    }

    #[test]
    fn byte_sizes_pick_a_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * MB + MB / 2), "5.5 MB");
    }
}
