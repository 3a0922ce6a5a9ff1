#![forbid(unsafe_code)]

//! Binary entrypoint for the `agora` operator CLI.

use std::process;

#[tokio::main]
async fn main() {
    process::exit(agora_cli::run().await);
}
