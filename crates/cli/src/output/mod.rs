//! Output formatting for human-readable and JSON modes

mod formatter;

pub use formatter::Formatter;

/// Global output switches shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Strict JSON on stdout, nothing else
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
