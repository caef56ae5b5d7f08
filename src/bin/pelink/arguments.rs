use std::path::PathBuf;

use anyhow::{anyhow, bail};

const USAGE: &str = "\
usage: pelink [options] <inputs>...

options:
  -o, --output <path>      output image path (default: first input with .exe)
      --entry <symbol>     entrypoint symbol name (default: mainCRTStartup)
      --image-base <addr>  image base address (default: 0x140000000)
  -v, --verbose            increase log verbosity, may be repeated
  -h, --help               print this message";

#[derive(Debug)]
pub struct ParsedCliArgs {
    pub output: PathBuf,
    pub entry: Option<String>,
    pub image_base: Option<u64>,
    pub verbose: u8,
    pub inputs: Vec<PathBuf>,
}

pub fn parse_arguments() -> anyhow::Result<ParsedCliArgs> {
    let mut output = None;
    let mut entry = None;
    let mut image_base = None;
    let mut verbose = 0u8;
    let mut inputs: Vec<PathBuf> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "-o" | "--output" => {
                output = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("'{arg}' needs a value"))?,
                ));
            }
            "--entry" => {
                entry = Some(args.next().ok_or_else(|| anyhow!("'{arg}' needs a value"))?);
            }
            "--image-base" => {
                let value = args.next().ok_or_else(|| anyhow!("'{arg}' needs a value"))?;
                image_base = Some(parse_address(&value)?);
            }
            "-v" | "--verbose" => verbose = verbose.saturating_add(1),
            _ if arg.starts_with('-') => bail!("unknown option '{arg}'"),
            _ => inputs.push(PathBuf::from(arg)),
        }
    }

    if inputs.is_empty() {
        bail!("no input files");
    }

    let output = output.unwrap_or_else(|| inputs[0].with_extension("exe"));

    Ok(ParsedCliArgs {
        output,
        entry,
        image_base,
        verbose,
        inputs,
    })
}

fn parse_address(value: &str) -> anyhow::Result<u64> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| anyhow!("invalid address '{value}'"))
}
