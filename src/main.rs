use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{deobfuscate, map, protect};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "obscura")]
#[command(version = VERSION)]
#[command(about = "Rename source identifiers into opaque tokens and translate them back")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename tagged or indexed identifiers across a project
    Protect(protect::ProtectArgs),
    /// Translate obfuscated names in a text file back to originals
    Deobfuscate(deobfuscate::DeobfuscateArgs),
    /// Inspect map files
    Map(map::MapArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);

    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err);
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
