//! Logging handle with colored module prefixes.
//!
//! Every component receives a [`Logger`] at construction instead of reaching
//! for process-wide state. The handle is `Copy`, so passing it around is free.
//!
//! # Example
//!
//! ```ignore
//! let logger = Logger::new(cli.debug);
//! log!(logger; "build"; "wrote {}", path.display());
//! debug!(logger; "cache"; "warming {}", root.display());
//! warn!(logger; "page"; "missing title in {}", filepath);
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{IsTerminal, Write, stdout},
    sync::OnceLock,
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;

/// Calculate total prefix length for a module name.
///
/// Returns: `module.len() + 3` (for `[`, `]`, and trailing space)
#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Get terminal width, cached after first call.
/// Falls back to 120 columns if detection fails.
fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

// ============================================================================
// Macros
// ============================================================================

/// Log an informational message with a colored module prefix.
///
/// ```ignore
/// log!(logger; "module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr; $module:expr; $($arg:tt)*) => {{
        $crate::logger::Logger::info(&$logger, $module, &format!($($arg)*))
    }};
}

/// Log a message that only shows up with `--debug`.
#[macro_export]
macro_rules! debug {
    ($logger:expr; $module:expr; $($arg:tt)*) => {{
        let logger: &$crate::logger::Logger = &$logger;
        if logger.is_debug() {
            logger.debug($module, &format!($($arg)*))
        }
    }};
}

/// Log a non-fatal warning.
#[macro_export]
macro_rules! warn {
    ($logger:expr; $module:expr; $($arg:tt)*) => {{
        $crate::logger::Logger::warn(&$logger, $module, &format!($($arg)*))
    }};
}

// ============================================================================
// Logger
// ============================================================================

/// Verbosity of a [`Logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Nothing is printed.
    #[cfg(test)]
    Quiet,
    /// Progress and warnings.
    Info,
    /// Everything, including per-file tracing.
    Debug,
}

/// Logging handle scoped to one CLI invocation.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    level: Level,
}

impl Default for Logger {
    fn default() -> Self {
        Self { level: Level::Info }
    }
}

impl Logger {
    /// Create a logger; `debug` raises verbosity to [`Level::Debug`].
    pub const fn new(debug: bool) -> Self {
        let level = if debug { Level::Debug } else { Level::Info };
        Self { level }
    }

    /// A logger that swallows everything.
    #[cfg(test)]
    pub const fn quiet() -> Self {
        Self {
            level: Level::Quiet,
        }
    }

    #[cfg(test)]
    pub const fn level(&self) -> Level {
        self.level
    }

    pub fn is_debug(&self) -> bool {
        self.level >= Level::Debug
    }

    pub fn info(&self, module: &str, message: &str) {
        if self.level >= Level::Info {
            write_line(module, message, Fit::Truncate);
        }
    }

    pub fn debug(&self, module: &str, message: &str) {
        if self.level >= Level::Debug {
            write_line(module, message, Fit::Truncate);
        }
    }

    /// Warnings are printed under a `warn` prefix regardless of the module,
    /// with the module folded into the message. They are never truncated.
    pub fn warn(&self, module: &str, message: &str) {
        if self.level >= Level::Info {
            write_line("warn", &format!("{module}: {message}"), Fit::Whole);
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// How a line is fitted to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fit {
    /// Cut single-line messages at the terminal width.
    Truncate,
    /// Print the message as is.
    Whole,
}

/// Print a message with a colored module prefix.
fn write_line(module: &str, message: &str, fit: Fit) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    let interactive = stdout.is_terminal();
    if interactive {
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    }

    let fit = if interactive { fit } else { Fit::Whole };
    let width = get_terminal_width() as usize;
    writeln!(stdout, "{prefix} {}", fit_message(module, message, width, fit)).ok();

    stdout.flush().ok();
}

/// The part of `message` shown after the `[module] ` prefix.
///
/// Long single-line messages are truncated to fit `width` under
/// [`Fit::Truncate`]; multi-line messages are always kept whole.
fn fit_message<'a>(module: &str, message: &'a str, width: usize, fit: Fit) -> &'a str {
    if fit == Fit::Whole || message.contains('\n') {
        return message;
    }
    truncate_str(message, width.saturating_sub(calc_prefix_len(module.len())))
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold(),
        "watch" => prefix.bright_green().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within `max_len` bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Tests
// ============================================================================
