use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Logging to stderr; -v raises the crate's level, everything else stays
    // at warn unless RUST_LOG says otherwise.
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("warn,timecard={}", level)),
    )
    .init();

    if let Err(e) = cli::run(args).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
