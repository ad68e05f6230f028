use clap::{Args, Subcommand};
use serde::Serialize;

use obscura::mapfile::{self, RunMetadata};

use crate::commands::{expand_path, CmdResult};

#[derive(Args, Debug)]
pub struct MapArgs {
    #[command(subcommand)]
    command: MapCommand,
}

#[derive(Subcommand, Debug)]
enum MapCommand {
    /// Show a map file's run metadata and entry count
    Show {
        /// Map file to read
        #[arg(long)]
        map: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum MapOutput {
    #[serde(rename = "map.show")]
    Show {
        path: String,
        metadata: RunMetadata,
        entries: usize,
    },
}

pub fn run(args: MapArgs) -> CmdResult<MapOutput> {
    match args.command {
        MapCommand::Show { map } => show(&map),
    }
}

fn show(raw_path: &str) -> CmdResult<MapOutput> {
    let path = expand_path(raw_path);
    let loaded = mapfile::read_map_file(&path)?;

    Ok((
        MapOutput::Show {
            path: path.display().to_string(),
            metadata: loaded.metadata,
            entries: loaded.map.len(),
        },
        0,
    ))
}
