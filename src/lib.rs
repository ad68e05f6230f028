//! Identifier obfuscation for multi-module Swift projects.
//!
//! `protect` discovers declarations (tag suffix or index snapshot), issues
//! opaque names through one shared [`ObfuscationMap`], rewrites sources,
//! markup and manifests, then writes a map file that `deobfuscate` reads back.

/// Prefixed status line on stderr, printed only when stderr is a terminal.
///
/// ```ignore
/// log_status!("scan", "Found {} tagged declarations in {}", count, module);
/// log_status!("rewrite", "Renamed {} -> {}", from, to);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

pub mod core;
pub mod utils;

// `obscura::rewrite` rather than `obscura::core::rewrite`
pub use core::*;
pub use utils::*;
