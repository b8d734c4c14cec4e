mod args;
mod dash;

use clap::Parser;
use log::debug;

fn main() {
    let args = args::Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("main: args: {:?}", args);

    if let Err(e) = dash::run_report(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
