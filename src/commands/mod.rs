use std::path::PathBuf;

pub type CmdResult<T> = obscura::Result<(T, i32)>;

pub mod deobfuscate;
pub mod map;
pub mod protect;

/// Expand `~` in a user-supplied path.
pub(crate) fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (obscura::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Protect(args) => dispatch!(args, protect),
        crate::Commands::Deobfuscate(args) => dispatch!(args, deobfuscate),
        crate::Commands::Map(args) => dispatch!(args, map),
    }
}
