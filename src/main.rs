use clang_build::cli::{exit_code, handle_build, CliArgs};
use clang_build::util::logging::{self, LoggingConfig};
use clang_build::{NAME, VERSION};

use clap::Parser;
use std::process;
use tracing::{debug, error};

fn main() {
    let args = CliArgs::parse();
    logging::init_logging(
        LoggingConfig::with_level(logging::resolve_level(
            args.log_level.as_deref(),
            args.verbose,
            args.quiet,
        ))
        .with_json(args.log_json),
    );

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let code = match handle_build(&args) {
        Ok(report) => {
            if !args.quiet {
                for package in &report.packages {
                    println!("{}", package.tarball_path.display());
                }
            }
            0
        }
        Err(err) => {
            error!("{:#}", err);
            exit_code(&err)
        }
    };

    process::exit(code);
}
