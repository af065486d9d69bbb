use clap::Parser;

use docqa_lib::{Command, Options};

#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Upload PDFs and ask questions about them")]
struct Args {
    /// Document service address (overrides DOCQA_API_BASE and settings.json)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let args = Args::parse();

    let options = Options {
        api_base: args.api_base,
        json: args.json,
    };
    std::process::exit(docqa_lib::run(options, args.command, args.verbose));
}
