use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use filemap::cli::Options;
use filemap::{report, scan, sort};

fn main() -> ExitCode {
    env_logger::init();

    let opts = Options::parse();
    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // One line per error in the chain, root cause last.
            eprintln!("filemap: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &Options) -> Result<()> {
    opts.validate()?;

    let mut graph = scan::run(&opts.path, opts.scan_options())?;
    sort::sort_extents(
        &mut graph.extents,
        &graph.inodes,
        opts.sort_key(),
        opts.sort_direction(),
    );
    report::print_report(&graph, opts);

    Ok(())
}
