// Minimal connection check: open the port and print the identity string.

use clap::Parser;
use std::time::Duration;
use tdscope_rs::TdsScope;

#[derive(Parser, Debug)]
#[command(about = "Query the identity of a TDS oscilloscope")]
struct Args {
    /// Serial communication port
    #[arg(long, default_value = "/dev/ttyS0")]
    port: String,

    /// Symbol rate
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Timeout in seconds
    #[arg(long, default_value_t = 3.0)]
    timeout: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let scope = TdsScope::connect(&args.port, args.baud, Duration::from_secs_f64(args.timeout))?;
    println!("*IDN: {}", scope.identify());
    Ok(())
}
