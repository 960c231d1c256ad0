//! lme2510 CLI — firmware upload and bus probing for LME2510C tuners.

use clap::Parser;

mod cli;

#[derive(Parser)]
#[command(
    name = "lme2510",
    version,
    about = "Control-plane tool for LME2510C USB DVB tuner devices"
)]
struct Args {
    /// Output as JSON (for devices)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let args = Args::parse();

    if let Err(e) = cli::run(args.command, args.json) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
