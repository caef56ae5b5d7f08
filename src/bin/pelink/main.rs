use anyhow::{Context, anyhow};
use log::error;

use pelink::{LinkError, Linker};

use arguments::ParsedCliArgs;

mod arguments;
mod logging;

fn main() {
    if let Err(e) = try_main() {
        if let Some(link_error) = e.downcast_ref::<LinkError>() {
            // Unresolved-symbol reports span several lines; print each on
            // its own prefixed line.
            for line in link_error.to_string().lines() {
                error!("{line}");
            }
        } else {
            error!("{e}");
        }
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = arguments::parse_arguments()?;
    logging::setup_logger(args.verbose)?;
    run_linker(args)
}

fn run_linker(args: ParsedCliArgs) -> anyhow::Result<()> {
    let mut linker = Linker::new();
    linker.verbose(args.verbose > 0);

    if let Some(entry) = args.entry {
        linker.entry(entry);
    }
    if let Some(image_base) = args.image_base {
        linker.image_base(image_base);
    }
    for input in args.inputs {
        linker.add_path(input);
    }

    let image = linker.link().map_err(|e| anyhow!(e))?;

    std::fs::write(&args.output, image)
        .with_context(|| format!("could not write {}", args.output.display()))?;
    mark_executable(&args.output)?;
    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &std::path::Path) -> anyhow::Result<()> {
    Ok(())
}
