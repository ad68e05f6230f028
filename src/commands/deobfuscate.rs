use clap::Args;
use serde::Serialize;

use obscura::deobfuscate;
use obscura::io;

use crate::commands::{expand_path, CmdResult};

#[derive(Args, Debug)]
pub struct DeobfuscateArgs {
    /// Text file to translate (crash log, stack trace)
    #[arg(long)]
    pub file: String,

    /// Map file written by `obscura protect`
    #[arg(long)]
    pub map: String,

    /// Write the translated text here instead of returning it
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum DeobfuscateOutput {
    #[serde(rename = "deobfuscate")]
    Deobfuscate {
        file: String,
        map: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

pub fn run(args: DeobfuscateArgs) -> CmdResult<DeobfuscateOutput> {
    let input = expand_path(&args.file);
    let map_file = expand_path(&args.map);
    let translated = deobfuscate::deobfuscate_file(&input, &map_file)?;

    let (output_path, text) = match args.output.as_deref().map(expand_path) {
        Some(path) => {
            io::write_file(&path, &translated, "write deobfuscated output")?;
            (Some(path.display().to_string()), None)
        }
        None => (None, Some(translated)),
    };

    Ok((
        DeobfuscateOutput::Deobfuscate {
            file: input.display().to_string(),
            map: map_file.display().to_string(),
            output_path,
            text,
        },
        0,
    ))
}
