//! ANSI terminal colors.

pub const RESET: &str = "\x1b[0m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";

/// Erase the current terminal line and return the cursor to its start.
pub const CLEAR_LINE: &str = "\x1b[2K\r";

pub fn paint(text: &str, color: &str) -> String {
    format!("{color}{text}{RESET}")
}
