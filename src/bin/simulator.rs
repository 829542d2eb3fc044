//! One-way simulator: transmit a payload file from one host to another.
//!
//! ```text
//! simulator <medium type> <data link layer type> <transmission data file>
//! ```
//!
//! `main` owns only process setup (logging, argument handling); all protocol
//! work happens in the library.

use std::env;
use std::io::{self, Write};

use anyhow::Result;

use par_link::simulator;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!(
            "Usage: {} <medium type> <data link layer type> <transmission data file>",
            args[0]
        );
        std::process::exit(1);
    }

    let payload = simulator::read_payload(&args[3])?;
    let (mut sender, mut receiver) = simulator::host_pair(&args[1], &args[2])?;

    receiver.start();
    sender.start();
    sender.send(&payload);

    print!("Press enter to receive: ");
    io::stdout().flush()?;
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
    })
    .await?;

    let received = receiver.retrieve();
    println!(
        "Transmission received:  {}",
        String::from_utf8_lossy(&received)
    );
    simulator::report(&payload, &received);

    receiver.stop().await;
    sender.stop().await;
    Ok(())
}
