pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Command, Options};

/// Initialize tracing/logging with the given directives. Logs go to stderr so
/// command output on stdout stays clean for `--json`.
pub fn init_logging(directives: &[&str]) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring log directive '{}': {}", directive, e),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a single command and return the exit code.
pub fn run(options: Options, command: Command, verbose: bool) -> i32 {
    if verbose {
        init_logging(&["docqa=debug", "docqa_lib=debug", "docqa_core=debug"]);
    } else {
        init_logging(&["docqa=warn", "docqa_lib=warn", "docqa_core=warn"]);
    }
    tracing::debug!(?command, "Starting DocQA");

    cli::run(options, command)
}
