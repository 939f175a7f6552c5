use crate::hardcopy::{HardcopyImage, HardcopySettings, MIN_PLAUSIBLE_BYTES};
use crate::serial_link::{ScopeLink, SerialLink, SerialLinkError};
use crate::waveform::{self, ChannelRecording, MeasurementSet, WaveformError, WaveformPreamble};
use std::thread;
use std::time::Duration;

/// Identity replies shorter than this mean nothing is answering on the
/// link.
const MIN_IDENT_LEN: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum TdsScopeError {
    #[error("serial link error: {0}")]
    Link(#[from] SerialLinkError),

    #[error("no instrument is responding on the serial link (identity {ident:?})")]
    InstrumentNotResponding { ident: String },

    #[error("could not read channel {channel}")]
    ChannelRead {
        channel: u8,
        #[source]
        source: WaveformError,
    },

    #[error("hardcopy capture too small ({size} bytes)")]
    HardcopyRejected { size: usize },

    #[error("hardcopy transfer still producing data after {polls} polls ({size} bytes buffered)")]
    HardcopyStalled { size: usize, polls: u32 },
}

/// Driver for TDS-family oscilloscopes.
///
/// Owns the link exclusively for its lifetime and issues strictly
/// sequential command/response exchanges; the protocol has no request IDs,
/// so there is never more than one exchange in flight. The connection is
/// released when the driver is dropped.
pub struct TdsScope {
    link: Box<dyn ScopeLink>,
    ident: String,
}

impl TdsScope {
    /// Open `port` and prepare the instrument for line-oriented traffic.
    pub fn connect(port: &str, baud: u32, timeout: Duration) -> Result<Self, TdsScopeError> {
        let link = SerialLink::open(port, baud, timeout)?;
        Self::with_link(Box::new(link))
    }

    /// Build a driver on an existing link.
    ///
    /// Runs the setup sequence: LF line termination, hardware flow control,
    /// echoed headers off, then caches the `*IDN?` reply.
    pub fn with_link(link: Box<dyn ScopeLink>) -> Result<Self, TdsScopeError> {
        let mut scope = Self {
            link,
            ident: String::new(),
        };

        scope.send("RS232:TRANSMIT LF")?;
        scope.send("RS232:HARDFLAGGING ON")?;
        // NOTE: the instrument rejects this one in capital letters
        scope.send("header off")?;

        scope.ident = scope.query("*IDN?")?;
        log::debug!("*IDN: {}", scope.ident);
        Ok(scope)
    }

    /// Send a command. No reply is expected; instrument errors surface only
    /// through later queries coming back empty.
    pub fn send(&mut self, command: &str) -> Result<(), TdsScopeError> {
        log::debug!("> {command}");
        self.link.write_line(command)?;
        Ok(())
    }

    /// Ask for data or information and read exactly one reply line.
    ///
    /// An empty reply means the instrument did not understand the command
    /// or is not ready; callers of data-bearing queries must treat it as a
    /// protocol error.
    pub fn query(&mut self, command: &str) -> Result<String, TdsScopeError> {
        log::debug!("> {command}");
        self.link.write_line(command)?;
        let raw = self.link.read_line()?;
        let reply = String::from_utf8_lossy(&raw).trim().to_string();
        log::debug!("< {reply}");
        Ok(reply)
    }

    /// The cached `*IDN?` reply.
    pub fn identify(&self) -> &str {
        &self.ident
    }

    /// Pre-flight health check run by every top-level operation before any
    /// channel or hardcopy command is sent.
    fn ensure_responding(&self) -> Result<(), TdsScopeError> {
        if self.ident.len() < MIN_IDENT_LEN {
            return Err(TdsScopeError::InstrumentNotResponding {
                ident: self.ident.clone(),
            });
        }
        Ok(())
    }

    /// Bracket `body` with front-panel LOCK/UNLOCK so a failed run never
    /// leaves the instrument controls disabled. The unlock is issued
    /// exactly once on every exit path; if both the body and the unlock
    /// fail, the body error wins.
    fn with_panel_lock<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, TdsScopeError>,
    ) -> Result<T, TdsScopeError> {
        self.send("LOCK ALL")?;
        let result = body(self);
        let unlock = self.send("UNLOCK ALL");

        match (result, unlock) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(unlock_err)) => Err(unlock_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unlock_err)) => {
                log::warn!("unlock after failed operation also failed: {unlock_err}");
                Err(err)
            }
        }
    }

    fn channel_read(channel: u8, source: WaveformError) -> TdsScopeError {
        TdsScopeError::ChannelRead { channel, source }
    }

    /// Read a single channel.
    ///
    /// Fetches the preamble, synthesizes the time vector and decodes the
    /// 2500-point curve; with `convert` the samples are additionally scaled
    /// to physical units.
    pub fn record(&mut self, channel: u8, convert: bool) -> Result<ChannelRecording, TdsScopeError> {
        self.ensure_responding()?;
        log::debug!("trying to read channel {channel}");

        self.with_panel_lock(|scope| {
            scope.link.discard_input()?;
            scope.send("DATA INIT")?;
            scope.send(&format!("DATA:SOURCE CH{channel}"))?;
            scope.send("DATA:ENC ASCII")?;
            scope.send("DATA:WIDTH 1")?;

            let data_block = scope.query("DATA?")?;
            log::debug!("DATA: {data_block}");

            let xincr = scope.query(&format!("WFMPRE:CH{channel}:XINCR?"))?;
            if xincr.is_empty() {
                // Nothing answered for this channel; do not bother with the
                // remaining preamble fields.
                return Err(Self::channel_read(
                    channel,
                    WaveformError::EmptyField { field: "XINCR" },
                ));
            }
            let ymult = scope.query(&format!("WFMPRE:CH{channel}:YMULT?"))?;
            let yoff = scope.query(&format!("WFMPRE:CH{channel}:YOFF?"))?;
            let yzero = scope.query(&format!("WFMPRE:CH{channel}:YZERO?"))?;
            log::debug!("xincr:{xincr}, ymult:{ymult}, yoff:{yoff}, yzero:{yzero}");

            let preamble = WaveformPreamble::parse(&xincr, &ymult, &yoff, &yzero)
                .map_err(|source| Self::channel_read(channel, source))?;

            let curve = scope.query("CURVE?")?;
            let raw_samples =
                waveform::parse_curve(&curve).map_err(|source| Self::channel_read(channel, source))?;
            log::debug!("curve points: {}", raw_samples.len());

            ChannelRecording::new(channel, preamble, raw_samples, convert)
                .map_err(|source| Self::channel_read(channel, source))
        })
    }

    /// Read several channels into one measurement set.
    ///
    /// Aborts on the first failing channel; partial sets are never
    /// returned.
    pub fn record_channels(
        &mut self,
        channels: &[u8],
        convert: bool,
    ) -> Result<MeasurementSet, TdsScopeError> {
        self.ensure_responding()?;

        let mut set = MeasurementSet::new();
        for &channel in channels {
            let recording = self.record(channel, convert)?;
            set.push(recording)
                .map_err(|source| Self::channel_read(channel, source))?;
        }
        Ok(set)
    }

    /// Capture a screen hardcopy with default pacing.
    pub fn hardcopy(&mut self) -> Result<HardcopyImage, TdsScopeError> {
        self.hardcopy_with(&HardcopySettings::default())
    }

    /// Capture a screen hardcopy.
    ///
    /// Triggers the dump and drains the link until a poll observes no new
    /// bytes. The transfer carries no length, so the gone-quiet heuristic
    /// ends it; `settings.max_polls` bounds a device that never goes quiet.
    pub fn hardcopy_with(
        &mut self,
        settings: &HardcopySettings,
    ) -> Result<HardcopyImage, TdsScopeError> {
        self.ensure_responding()?;

        let buffer = self.with_panel_lock(|scope| {
            scope.link.discard_input()?;
            scope.send("HARDCOPY:PORT RS232")?;
            scope.send("HARDCOPY:FORMAT BMP")?;
            scope.send("HARDCOPY:LAYOUT PORTRAIT")?;
            scope.send("HARDCOPY START")?;

            let mut buffer = Vec::new();
            let mut polls = 0u32;
            loop {
                thread::sleep(settings.poll_interval);
                let available = scope.link.bytes_available()?;
                if available == 0 {
                    break;
                }
                buffer.extend_from_slice(&scope.link.read_available(available)?);
                log::debug!("{:2.1} kB of some 40 kB", buffer.len() as f64 / 1000.0);

                polls += 1;
                if polls >= settings.max_polls {
                    return Err(TdsScopeError::HardcopyStalled {
                        size: buffer.len(),
                        polls,
                    });
                }
            }
            Ok(buffer)
        })?;

        if buffer.len() < MIN_PLAUSIBLE_BYTES {
            return Err(TdsScopeError::HardcopyRejected { size: buffer.len() });
        }
        Ok(HardcopyImage::new(buffer))
    }
}
