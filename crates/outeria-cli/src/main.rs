#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use outeria_core::{BuildOptions, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "outeria")]
#[command(author, version, about = "Front-end component boilerplate: dev server and bundle pipeline", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve static/ at / and dist/ at /dist (default command)
    Serve {
        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Bundle the entry module into dist/
    Build {
        /// Rebuild whenever a source file changes (never minified)
        #[arg(long, short)]
        watch: bool,

        /// Minify the bundle (default unless ROLLUP_WATCH is set)
        #[arg(long, conflicts_with = "no_production")]
        production: bool,

        /// Skip minification
        #[arg(long)]
        no_production: bool,
    },

    /// Write the project scaffold into the working directory
    Init {
        /// Overwrite existing files
        #[arg(long, short)]
        force: bool,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    if matches!(cli.command, Some(Commands::Version)) {
        return commands::version::run(cli.json);
    }

    logging::init(config.verbosity, config.json_logs);

    let _span = tracing::info_span!("outeria", cwd = %config.cwd.display()).entered();

    match cli.command {
        None => commands::serve::run(&config, None, None),
        Some(Commands::Serve { port, host }) => commands::serve::run(&config, port, host),
        Some(Commands::Build {
            watch,
            production,
            no_production,
        }) => {
            let options = if production {
                BuildOptions::production()
            } else if no_production {
                BuildOptions::development()
            } else {
                BuildOptions::from_env()
            };
            if watch {
                commands::build::watch(&config, options)
            } else {
                commands::build::run(&config, options)
            }
        }
        Some(Commands::Init { force }) => commands::init::run(&config, force),
        Some(Commands::Version) => commands::version::run(cli.json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_defaults_to_serve() {
        let cli = Cli::parse_from(["outeria"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::parse_from(["outeria", "build", "--watch", "--no-production", "--json"]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Some(Commands::Build {
                watch: true,
                production: false,
                no_production: true
            })
        ));

        assert!(Cli::try_parse_from(["outeria", "build", "--production", "--no-production"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["outeria", "serve", "--port", "8080", "-vv", "--cwd", "/tmp/app"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.cwd, Some(PathBuf::from("/tmp/app")));
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(8080), .. })));
    }
}
