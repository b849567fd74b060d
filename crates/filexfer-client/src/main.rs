//! Secure file-transfer client
//!
//! Registers (or reconnects), performs an RSA/AES key exchange, uploads a
//! configured file in encrypted chunks, and drives the CRC accept/retry/
//! abort protocol to completion.

mod config;
mod driver;
mod ops;
mod session;

use clap::Parser;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "filexfer-client", about = "Secure file-transfer protocol client")]
struct Cli {
    /// Directory containing transfer.info, me.info, and priv.key.
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match driver::run(&cli.config_dir) {
        Ok(driver::Outcome::Accept) => {
            println!("Ending with: Accept");
            std::process::exit(0);
        }
        Ok(driver::Outcome::Abort) => {
            println!("Ending with: Abort");
            std::process::exit(1);
        }
        Err(failure) => {
            error!("{failure}");
            print!("{failure}");
            println!("Ending with: Abort");
            std::process::exit(1);
        }
    }
}
