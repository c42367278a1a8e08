// src/main.rs

use relaunch::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("relaunch error: {err:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(summary) => std::process::exit(summary.exit_code()),
        Err(err) => {
            eprintln!("relaunch error: {err}");
            std::process::exit(1);
        }
    }
}
