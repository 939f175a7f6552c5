use crate::hardcopy::{BitmapConverter, HardcopyImage};
use crate::waveform::{ChannelRecording, MeasurementSet, WaveformPreamble};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("DataFrame error: {0}")]
    Polars(#[from] PolarsError),

    #[error("nothing to write: measurement set is empty")]
    EmptySet,
}

/// On-disk shape of one recording in the YAML output: channel id, the four
/// preamble fields, the data column (volt-scaled when converted, raw codes
/// otherwise) and the time stems.
#[derive(Serialize)]
struct YamlRecording<'a> {
    chn: u8,
    #[serde(flatten)]
    preamble: &'a WaveformPreamble,
    data: DataColumn<'a>,
    t: &'a [f64],
}

#[derive(Serialize)]
#[serde(untagged)]
enum DataColumn<'a> {
    Raw(&'a [i32]),
    Converted(&'a [f64]),
}

impl<'a> From<&'a ChannelRecording> for YamlRecording<'a> {
    fn from(recording: &'a ChannelRecording) -> Self {
        let data = match recording.values() {
            Some(values) => DataColumn::Converted(values),
            None => DataColumn::Raw(recording.raw_samples()),
        };
        Self {
            chn: recording.channel(),
            preamble: recording.preamble(),
            data,
            t: recording.time_vector(),
        }
    }
}

/// Write `<basename>.yaml` with one document listing every recording.
pub fn write_yaml(set: &MeasurementSet, basename: &str) -> Result<PathBuf, SinkError> {
    if set.is_empty() {
        return Err(SinkError::EmptySet);
    }

    let path = PathBuf::from(format!("{basename}.yaml"));
    let documents: Vec<YamlRecording> = set.recordings().iter().map(YamlRecording::from).collect();
    let file = File::create(&path)?;
    serde_yaml::to_writer(file, &documents)?;

    log::debug!("wrote {} recordings to {}", set.len(), path.display());
    Ok(path)
}

/// Write `<basename>.dat`: space-separated columns without a header, time
/// stems first, then one column per channel.
pub fn write_dat(set: &MeasurementSet, basename: &str) -> Result<PathBuf, SinkError> {
    if set.is_empty() {
        return Err(SinkError::EmptySet);
    }

    let path = PathBuf::from(format!("{basename}.dat"));
    let mut df = set.to_dataframe()?;
    let file = File::create(&path)?;
    CsvWriter::new(file)
        .include_header(false)
        .with_separator(b' ')
        .finish(&mut df)?;

    log::debug!("wrote {} rows to {}", df.height(), path.display());
    Ok(path)
}

/// Write `<basename>.png` from an accepted capture: the raw bitmap goes to
/// `<basename>.bmp`, the converter turns it into the PNG, and the
/// intermediate bitmap is removed either way.
pub fn write_png(
    image: &HardcopyImage,
    basename: &str,
    converter: &dyn BitmapConverter,
) -> Result<PathBuf, SinkError> {
    let bitmap_path = PathBuf::from(format!("{basename}.bmp"));
    let png_path = PathBuf::from(format!("{basename}.png"));

    std::fs::write(&bitmap_path, image.as_bytes())?;
    let converted = converter.convert(&bitmap_path, &png_path);
    let _ = std::fs::remove_file(&bitmap_path);
    converted?;

    log::debug!("wrote {} byte capture to {}", image.len(), png_path.display());
    Ok(png_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::CURVE_POINTS;
    use std::io;
    use std::path::Path;

    fn sample_set() -> MeasurementSet {
        let preamble = WaveformPreamble {
            x_increment: 1e-3,
            y_multiplier: 2.0,
            y_offset: 10.0,
            y_zero: 0.5,
        };
        let mut set = MeasurementSet::new();
        set.push(ChannelRecording::new(1, preamble, vec![12; CURVE_POINTS], true).unwrap())
            .unwrap();
        set.push(ChannelRecording::new(2, preamble, vec![7; CURVE_POINTS], false).unwrap())
            .unwrap();
        set
    }

    fn basename(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn yaml_output_lists_every_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_yaml(&sample_set(), &basename(&dir, "capture")).unwrap();

        assert_eq!(path.extension().unwrap(), "yaml");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("chn: 1"));
        assert!(text.contains("chn: 2"));
        assert!(text.contains("xincr: 0.001"));
        assert!(text.contains("yzero: 0.5"));
    }

    #[test]
    fn dat_output_is_time_plus_one_column_per_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dat(&sample_set(), &basename(&dir, "capture")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), CURVE_POINTS);

        let first: Vec<f64> = lines[0]
            .split(' ')
            .map(|field| field.parse().unwrap())
            .collect();
        assert_eq!(first, [0.0, 3.5, 7.0]);
    }

    #[test]
    fn empty_set_writes_nothing() {
        assert!(matches!(
            write_yaml(&MeasurementSet::new(), "unused"),
            Err(SinkError::EmptySet)
        ));
        assert!(matches!(
            write_dat(&MeasurementSet::new(), "unused"),
            Err(SinkError::EmptySet)
        ));
    }

    /// Stand-in converter: copies the bitmap bytes instead of rasterizing.
    struct CopyConverter;

    impl BitmapConverter for CopyConverter {
        fn convert(&self, bitmap: &Path, png: &Path) -> io::Result<()> {
            std::fs::copy(bitmap, png).map(|_| ())
        }
    }

    #[test]
    fn png_sink_removes_the_intermediate_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let base = basename(&dir, "screen");
        let image = HardcopyImage::new(vec![0x42; 64]);

        let path = write_png(&image, &base, &CopyConverter).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x42; 64]);
        assert!(!Path::new(&format!("{base}.bmp")).exists());
    }
}
