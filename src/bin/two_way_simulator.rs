//! Two-way simulator: both hosts send *and* receive simultaneously.
//!
//! ```text
//! two-way-simulator <medium type> <data link layer type> \
//!                   <transmission data file A> <transmission data file B>
//! ```

use std::env;
use std::time::Duration;

use anyhow::Result;

use par_link::simulator;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        eprintln!(
            "Usage: {} <medium type> <data link layer type> \
             <transmission data file A> <transmission data file B>",
            args[0]
        );
        std::process::exit(1);
    }

    let payload_a = simulator::read_payload(&args[3])?;
    let payload_b = simulator::read_payload(&args[4])?;
    let (mut host_a, mut host_b) = simulator::host_pair(&args[1], &args[2])?;

    host_a.start();
    host_b.start();
    host_a.send(&payload_a);
    host_b.send(&payload_b);

    print!("Pausing...");
    tokio::time::sleep(Duration::from_secs(5)).await;
    println!("done.");

    let received_a = host_a.retrieve();
    let received_b = host_b.retrieve();

    println!("Transmission from A to B received:");
    println!("{}", String::from_utf8_lossy(&received_b));
    simulator::report(&payload_a, &received_b);

    println!();
    println!("Transmission from B to A received:");
    println!("{}", String::from_utf8_lossy(&received_a));
    simulator::report(&payload_b, &received_a);

    host_a.stop().await;
    host_b.stop().await;
    Ok(())
}
