use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Granularity of the blocking reads on the underlying port. The overall
/// response timeout is enforced per call with an [`Instant`] deadline.
const READ_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum SerialLinkError {
    #[error("could not open serial port {port}: {source}")]
    PortUnavailable {
        port: String,
        source: serialport::Error,
    },

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Half-duplex, line-terminated byte channel to the instrument.
///
/// The driver talks through this trait only; the serial implementation is
/// [`SerialLink`]. There are no retries at this layer, callers decide.
pub trait ScopeLink {
    /// Write one command line, terminated with LF. Blocks only until the
    /// bytes are handed to the OS.
    fn write_line(&mut self, text: &str) -> Result<(), SerialLinkError>;

    /// Read up to one LF-terminated line, waiting at most the configured
    /// response timeout. Returns whatever arrived (possibly nothing) if the
    /// timeout elapses first. The terminator is not included.
    fn read_line(&mut self) -> Result<Vec<u8>, SerialLinkError>;

    /// Number of bytes already buffered by the host.
    fn bytes_available(&mut self) -> Result<usize, SerialLinkError>;

    /// Read up to `n` already-buffered bytes without waiting for more.
    fn read_available(&mut self, n: usize) -> Result<Vec<u8>, SerialLinkError>;

    /// Drop any unread input.
    fn discard_input(&mut self) -> Result<(), SerialLinkError>;
}

/// RS-232 connection to the oscilloscope.
pub struct SerialLink {
    serial: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialLink {
    /// Open `port` at the given symbol rate. `timeout` bounds how long a
    /// single [`ScopeLink::read_line`] waits for the instrument to answer.
    pub fn open(port: &str, baud: u32, timeout: Duration) -> Result<Self, SerialLinkError> {
        let serial = serialport::new(port, baud)
            .timeout(READ_POLL)
            .open()
            .map_err(|source| SerialLinkError::PortUnavailable {
                port: port.to_string(),
                source,
            })?;

        log::debug!("opened {} at {} Bd", port, baud);
        Ok(Self { serial, timeout })
    }
}

impl ScopeLink for SerialLink {
    fn write_line(&mut self, text: &str) -> Result<(), SerialLinkError> {
        let line = format!("{text}\n");
        self.serial.write_all(line.as_bytes())?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, SerialLinkError> {
        let mut line = Vec::new();
        let deadline = Instant::now() + self.timeout;

        loop {
            let mut byte = [0u8; 1];
            match self.serial.read_exact(&mut byte) {
                Ok(()) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    line.push(byte[0]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if Instant::now() >= deadline {
                        break;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }

    fn bytes_available(&mut self) -> Result<usize, SerialLinkError> {
        Ok(self.serial.bytes_to_read()? as usize)
    }

    fn read_available(&mut self, n: usize) -> Result<Vec<u8>, SerialLinkError> {
        let mut buffer = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            match self.serial.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }

        buffer.truncate(filled);
        Ok(buffer)
    }

    fn discard_input(&mut self) -> Result<(), SerialLinkError> {
        self.serial.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_port_is_port_unavailable() {
        let err = SerialLink::open("/dev/tdscope-no-such-port", 9600, Duration::from_secs(1))
            .map(|_| ())
            .unwrap_err();

        match err {
            SerialLinkError::PortUnavailable { port, .. } => {
                assert_eq!(port, "/dev/tdscope-no-such-port");
            }
            other => panic!("expected PortUnavailable, got {other:?}"),
        }
    }
}
