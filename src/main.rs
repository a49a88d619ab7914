// src/main.rs

use sysworker::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("sysworker error: {err:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(code) => std::process::exit(if code < 0 { 1 } else { code }),
        Err(err) => {
            eprintln!("sysworker error: {err:?}");
            std::process::exit(1);
        }
    }
}
