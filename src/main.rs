//! Mycelium CLI entry point.

use clap::error::ErrorKind;
use clap::Parser;
use mycelium::cli::{self, Cli, EXIT_USAGE};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help/--version are not usage errors
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = e.print();
                std::process::exit(cli::EXIT_SUCCESS);
            }
            let _ = e.print();
            std::process::exit(EXIT_USAGE);
        }
    };

    std::process::exit(cli::run(&cli));
}
