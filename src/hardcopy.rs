use std::io;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Captures below this size are assumed truncated and never written to
/// disk. A full TDS bitmap dump is around 40 kB.
pub const MIN_PLAUSIBLE_BYTES: usize = 30_000;

/// Pacing of the hardcopy drain loop.
///
/// The transfer is not length-delimited; the stream is considered finished
/// once a poll observes no new bytes. `max_polls` bounds the loop so a
/// device that never goes quiet cannot block the session forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardcopySettings {
    /// Delay between polls, giving the instrument time to produce more
    /// bytes.
    pub poll_interval: Duration,
    /// Maximum number of non-empty polls before the transfer is declared
    /// stalled.
    pub max_polls: u32,
}

impl Default for HardcopySettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_polls: 60,
        }
    }
}

/// A screen capture that passed the plausibility threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardcopyImage {
    bytes: Vec<u8>,
}

impl HardcopyImage {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Raster-to-PNG conversion seam. The capture itself is format-agnostic
/// raw bytes; turning the instrument's bitmap into a PNG is delegated so
/// the core does not depend on one external tool.
pub trait BitmapConverter {
    fn convert(&self, bitmap: &Path, png: &Path) -> io::Result<()>;
}

/// Converter shelling out to ImageMagick's `convert`.
pub struct ImageMagick;

impl BitmapConverter for ImageMagick {
    fn convert(&self, bitmap: &Path, png: &Path) -> io::Result<()> {
        let status = Command::new("convert").arg(bitmap).arg(png).status()?;
        if !status.success() {
            return Err(io::Error::other(format!("convert exited with {status}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pacing_matches_the_instrument() {
        let settings = HardcopySettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.max_polls, 60);
    }

    #[test]
    fn image_exposes_its_buffer() {
        let image = HardcopyImage::new(vec![0x42; 3]);
        assert_eq!(image.len(), 3);
        assert!(!image.is_empty());
        assert_eq!(image.as_bytes(), &[0x42; 3]);
        assert_eq!(image.into_bytes(), vec![0x42; 3]);
    }
}
