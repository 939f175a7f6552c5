//! # TDScope RS
//!
//! A Rust library for reading waveforms and screen hardcopies from
//! Tektronix TDS oscilloscopes over an RS-232 serial link.
//!
//! The driver speaks the vendor command protocol: it configures the
//! instrument for line-oriented traffic, fetches per-channel scaling
//! preambles, decodes the fixed 2500-point ASCII curve into raw codes or
//! volt-scaled values, and drains the variable-length bitmap hardcopy
//! stream until the device goes quiet. Small sinks persist recordings as
//! YAML or columnar `.dat` files and accepted captures as PNG via a
//! pluggable converter.
//!
//! ## Features
//!
//! - **Single-session driver**: one exclusively owned serial connection,
//!   strictly sequential command/response exchanges
//! - **Waveform decoding**: preamble-driven scaling to physical units with
//!   a locally synthesized time vector
//! - **Hardcopy capture**: gone-quiet drain loop with a plausibility
//!   threshold and a stall guard
//! - **Front-panel safety**: every acquisition is bracketed with
//!   LOCK/UNLOCK so a failed run never leaves the controls disabled
//! - **DataFrame output**: `polars` tables for columnar persistence
//!
//! ## Examples
//!
//! ### Record a channel
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tdscope_rs::TdsScope;
//!
//! let mut scope = TdsScope::connect("/dev/ttyS0", 9600, Duration::from_secs(3))?;
//! println!("connected to {}", scope.identify());
//!
//! // Volt-scaled samples of channel 1
//! let recording = scope.record(1, true)?;
//! println!("captured {} samples", recording.raw_samples().len());
//! # Ok::<(), tdscope_rs::TdsScopeError>(())
//! ```
//!
//! ### Persist a multi-channel acquisition
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tdscope_rs::{recording_sink, TdsScope};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scope = TdsScope::connect("/dev/ttyS0", 9600, Duration::from_secs(3))?;
//! let set = scope.record_channels(&[1, 2], false)?;
//! recording_sink::write_yaml(&set, "measurement")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Screen hardcopy
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tdscope_rs::{recording_sink, ImageMagick, TdsScope};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scope = TdsScope::connect("/dev/ttyS0", 9600, Duration::from_secs(3))?;
//! let image = scope.hardcopy()?;
//! recording_sink::write_png(&image, "screen", &ImageMagick)?;
//! # Ok(())
//! # }
//! ```

pub mod hardcopy;
pub mod recording_sink;
pub mod serial_link;
pub mod tds_scope;
pub mod waveform;

// Re-export the main types for convenience
pub use hardcopy::{
    BitmapConverter, HardcopyImage, HardcopySettings, ImageMagick, MIN_PLAUSIBLE_BYTES,
};

pub use recording_sink::SinkError;

pub use serial_link::{ScopeLink, SerialLink, SerialLinkError};

pub use tds_scope::{TdsScope, TdsScopeError};

pub use waveform::{
    ChannelRecording, MeasurementSet, WaveformError, WaveformPreamble, CURVE_POINTS,
};
