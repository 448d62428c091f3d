use std::sync::Arc;

use clap::Parser;

use ephca::daemon::config::{Config, Options};
use ephca::daemon::start::start_ephca_daemon;

#[tokio::main]
async fn main() {
    let options = Options::parse();

    match Config::create(&options) {
        Ok(config) => {
            if let Err(e) = start_ephca_daemon(Arc::new(config), None).await {
                eprintln!("ephca failed: {}", e);
                ::std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            ::std::process::exit(1);
        }
    }
}
