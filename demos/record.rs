// Record channels or store a hardcopy of a TDS oscilloscope screen.
//
// Mirrors the classic command line surface: channel data goes to
// <basename>.yaml (or <basename>.dat with --dat), a hardcopy goes to
// <basename>.png. Exit statuses stay distinguishable: 6 when no instrument
// answers, 5 when the hardcopy capture fails, the channel number when a
// channel read fails.

use clap::Parser;
use log::LevelFilter;
use std::time::Duration;
use tdscope_rs::{recording_sink, ImageMagick, TdsScope, TdsScopeError};

#[derive(Parser, Debug)]
#[command(about = "Read channels or get a hardcopy of Tektronix TDS oscilloscopes via serial port")]
struct Args {
    /// Body of the output file name: a hardcopy will be named
    /// <basename>.png, channel data <basename>.yaml or <basename>.dat
    basename: String,

    /// Serial communication port
    #[arg(long, default_value = "/dev/ttyS0")]
    port: String,

    /// Symbol rate (the instrument's 19200 Bd maximum tends not to work)
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Timeout in seconds for waiting on oscilloscope responses
    #[arg(long, default_value_t = 3.0)]
    timeout: f64,

    /// Channels to record, e.g. 124 records channels 1, 2 and 4
    #[arg(long)]
    channel: Option<String>,

    /// Store a hardcopy as <basename>.png
    #[arg(long)]
    hardcopy: bool,

    /// Store measurement values as columns in <basename>.dat instead of
    /// the YAML format; the first column contains the time stems
    #[arg(short = 'd', long)]
    dat: bool,

    /// Print status messages
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();

    std::process::exit(run(&args));
}

fn run(args: &Args) -> i32 {
    let timeout = Duration::from_secs_f64(args.timeout);
    let mut scope = match TdsScope::connect(&args.port, args.baud, timeout) {
        Ok(scope) => scope,
        Err(err) => {
            eprintln!("{err}");
            return exit_code(&err);
        }
    };

    if scope.identify().len() < 5 {
        eprintln!("Could not read device ID, aborting... Check your port.");
        return 6;
    }
    println!("*IDN: {}", scope.identify());

    if args.hardcopy {
        let image = match scope.hardcopy() {
            Ok(image) => image,
            Err(err) => {
                eprintln!("{err}");
                return exit_code(&err);
            }
        };
        match recording_sink::write_png(&image, &args.basename, &ImageMagick) {
            Ok(path) => println!("stored hardcopy as {}", path.display()),
            Err(err) => {
                eprintln!("{err}");
                return 5;
            }
        }
    }

    let channels: Vec<u8> = args
        .channel
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter_map(|c| c.to_digit(10).map(|d| d as u8))
        .collect();

    if !channels.is_empty() {
        let set = match scope.record_channels(&channels, args.dat) {
            Ok(set) => set,
            Err(err) => {
                eprintln!("{err}");
                return exit_code(&err);
            }
        };

        let written = if args.dat {
            recording_sink::write_dat(&set, &args.basename)
        } else {
            recording_sink::write_yaml(&set, &args.basename)
        };
        match written {
            Ok(path) => println!("stored {} channel(s) as {}", set.len(), path.display()),
            Err(err) => {
                eprintln!("{err}");
                return 1;
            }
        }
    }

    0
}

fn exit_code(err: &TdsScopeError) -> i32 {
    match err {
        TdsScopeError::InstrumentNotResponding { .. } => 6,
        TdsScopeError::HardcopyRejected { .. } | TdsScopeError::HardcopyStalled { .. } => 5,
        TdsScopeError::ChannelRead { channel, .. } => i32::from(*channel),
        TdsScopeError::Link(_) => 1,
    }
}
