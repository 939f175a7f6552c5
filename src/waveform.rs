use polars::prelude::*;
use serde::Serialize;

/// Fixed record length of the TDS curve transfer.
pub const CURVE_POINTS: usize = 2500;

const TIME_COLUMN_NAME: &str = "time";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WaveformError {
    #[error("empty reply to {field} query")]
    EmptyField { field: &'static str },

    #[error("unparsable {field} value {text:?}")]
    Malformed { field: &'static str, text: String },

    #[error("expected {expected} curve points, got {got}")]
    SampleCount { expected: usize, got: usize },

    #[error("recording of {got} points does not share the {expected}-point time base")]
    TimeBaseMismatch { expected: usize, got: usize },
}

/// Per-channel scaling parameters, fetched from the instrument before each
/// curve transfer. Values can change between channels and configurations,
/// so a preamble is never reused across acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaveformPreamble {
    #[serde(rename = "xincr")]
    pub x_increment: f64,
    #[serde(rename = "ymult")]
    pub y_multiplier: f64,
    #[serde(rename = "yoff")]
    pub y_offset: f64,
    #[serde(rename = "yzero")]
    pub y_zero: f64,
}

impl WaveformPreamble {
    /// Parse the four preamble fields from their instrument-formatted ASCII
    /// replies.
    pub fn parse(
        x_increment: &str,
        y_multiplier: &str,
        y_offset: &str,
        y_zero: &str,
    ) -> Result<Self, WaveformError> {
        Ok(Self {
            x_increment: parse_field("XINCR", x_increment)?,
            y_multiplier: parse_field("YMULT", y_multiplier)?,
            y_offset: parse_field("YOFF", y_offset)?,
            y_zero: parse_field("YZERO", y_zero)?,
        })
    }

    /// Scale one raw sample code to physical units.
    pub fn code_to_value(&self, code: i32) -> f64 {
        (f64::from(code) - self.y_offset) * self.y_multiplier - self.y_zero
    }

    /// Time stems for the fixed-length record. Synthesized locally, the
    /// instrument only supplies the increment.
    pub fn time_vector(&self) -> Vec<f64> {
        (0..CURVE_POINTS)
            .map(|index| self.x_increment * index as f64)
            .collect()
    }
}

fn parse_field(field: &'static str, text: &str) -> Result<f64, WaveformError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(WaveformError::EmptyField { field });
    }
    text.parse().map_err(|_| WaveformError::Malformed {
        field,
        text: text.to_string(),
    })
}

/// Split and parse one `CURVE?` reply of comma-separated sample codes.
///
/// Anything other than exactly [`CURVE_POINTS`] well-formed integers is a
/// hard failure; partial curves are never returned.
pub fn parse_curve(text: &str) -> Result<Vec<i32>, WaveformError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(WaveformError::EmptyField { field: "CURVE" });
    }

    let mut samples = Vec::with_capacity(CURVE_POINTS);
    for code in text.split(',') {
        let code = code.trim();
        samples.push(code.parse().map_err(|_| WaveformError::Malformed {
            field: "CURVE",
            text: code.to_string(),
        })?);
    }

    if samples.len() != CURVE_POINTS {
        return Err(WaveformError::SampleCount {
            expected: CURVE_POINTS,
            got: samples.len(),
        });
    }
    Ok(samples)
}

/// One acquired channel: raw sample codes, the locally derived time vector
/// and, when requested, the volt-scaled values.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRecording {
    channel: u8,
    preamble: WaveformPreamble,
    raw_samples: Vec<i32>,
    time_vector: Vec<f64>,
    values: Option<Vec<f64>>,
}

impl ChannelRecording {
    /// Build a recording from decoded sample codes. `convert` additionally
    /// scales every code to physical units via the preamble.
    pub fn new(
        channel: u8,
        preamble: WaveformPreamble,
        raw_samples: Vec<i32>,
        convert: bool,
    ) -> Result<Self, WaveformError> {
        if raw_samples.len() != CURVE_POINTS {
            return Err(WaveformError::SampleCount {
                expected: CURVE_POINTS,
                got: raw_samples.len(),
            });
        }

        let values = convert.then(|| {
            raw_samples
                .iter()
                .map(|&code| preamble.code_to_value(code))
                .collect()
        });

        Ok(Self {
            channel,
            preamble,
            time_vector: preamble.time_vector(),
            raw_samples,
            values,
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn preamble(&self) -> &WaveformPreamble {
        &self.preamble
    }

    pub fn raw_samples(&self) -> &[i32] {
        &self.raw_samples
    }

    pub fn time_vector(&self) -> &[f64] {
        &self.time_vector
    }

    /// Volt-scaled values, present only when the recording was made with
    /// `convert`.
    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }
}

/// Ordered collection of recordings sharing one time base. The tabular view
/// takes its time axis from the first recording.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeasurementSet {
    recordings: Vec<ChannelRecording>,
}

impl MeasurementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, recording: ChannelRecording) -> Result<(), WaveformError> {
        if let Some(first) = self.recordings.first() {
            if recording.time_vector.len() != first.time_vector.len() {
                return Err(WaveformError::TimeBaseMismatch {
                    expected: first.time_vector.len(),
                    got: recording.time_vector.len(),
                });
            }
        }
        self.recordings.push(recording);
        Ok(())
    }

    pub fn recordings(&self) -> &[ChannelRecording] {
        &self.recordings
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    /// Shared time axis, from the first recording.
    pub fn time_vector(&self) -> Option<&[f64]> {
        self.recordings.first().map(ChannelRecording::time_vector)
    }

    /// Tabular view: one `time` column followed by one column per channel,
    /// volt-scaled where the recording was converted, raw codes otherwise.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let first = self.recordings.first().ok_or_else(|| {
            PolarsError::NoData("no recordings in measurement set".into())
        })?;

        let mut columns: Vec<Column> = Vec::with_capacity(self.recordings.len() + 1);
        columns.push(Series::new(TIME_COLUMN_NAME.into(), first.time_vector()).into());

        for recording in &self.recordings {
            let name = format!("ch{}", recording.channel());
            let series = match recording.values() {
                Some(values) => Series::new(name.into(), values),
                None => Series::new(name.into(), recording.raw_samples()),
            };
            columns.push(series.into());
        }

        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preamble() -> WaveformPreamble {
        WaveformPreamble {
            x_increment: 1e-3,
            y_multiplier: 2.0,
            y_offset: 10.0,
            y_zero: 0.5,
        }
    }

    #[test]
    fn parse_instrument_formatted_fields() {
        let preamble = WaveformPreamble::parse("1.0E-3", "2.0", "10", "0.5").unwrap();
        assert_eq!(preamble.x_increment, 1e-3);
        assert_eq!(preamble.y_multiplier, 2.0);
        assert_eq!(preamble.y_offset, 10.0);
        assert_eq!(preamble.y_zero, 0.5);
    }

    #[test]
    fn malformed_field_is_rejected() {
        let err = WaveformPreamble::parse("1.0E-3", "two", "10", "0.5").unwrap_err();
        assert_eq!(
            err,
            WaveformError::Malformed {
                field: "YMULT",
                text: "two".to_string(),
            }
        );
    }

    #[test]
    fn conversion_matches_reference_formula() {
        assert_eq!(preamble().code_to_value(12), (12.0 - 10.0) * 2.0 - 0.5);
    }

    #[test]
    fn identity_scaling_returns_the_code() {
        let identity = WaveformPreamble {
            x_increment: 1.0,
            y_multiplier: 1.0,
            y_offset: 0.0,
            y_zero: 0.0,
        };
        assert_eq!(identity.code_to_value(42), 42.0);
    }

    #[test]
    fn time_vector_is_increment_times_index() {
        let time = preamble().time_vector();
        assert_eq!(time.len(), CURVE_POINTS);
        for (index, stem) in time.iter().enumerate() {
            assert_eq!(*stem, 1e-3 * index as f64);
        }
    }

    #[test]
    fn short_curve_is_a_hard_failure() {
        let text = vec!["12"; CURVE_POINTS - 1].join(",");
        assert_eq!(
            parse_curve(&text).unwrap_err(),
            WaveformError::SampleCount {
                expected: CURVE_POINTS,
                got: CURVE_POINTS - 1,
            }
        );
    }

    #[test]
    fn curve_parses_all_points() {
        let text = vec!["12"; CURVE_POINTS].join(",");
        let samples = parse_curve(&text).unwrap();
        assert_eq!(samples.len(), CURVE_POINTS);
        assert!(samples.iter().all(|&code| code == 12));
    }

    #[test]
    fn recording_lengths_agree() {
        let recording =
            ChannelRecording::new(1, preamble(), vec![12; CURVE_POINTS], true).unwrap();
        assert_eq!(recording.raw_samples().len(), CURVE_POINTS);
        assert_eq!(recording.time_vector().len(), CURVE_POINTS);
        assert_eq!(recording.values().unwrap().len(), CURVE_POINTS);
        assert!(recording.values().unwrap().iter().all(|&v| v == 3.5));
    }

    #[test]
    fn dataframe_has_time_and_channel_columns() {
        let mut set = MeasurementSet::new();
        set.push(ChannelRecording::new(1, preamble(), vec![12; CURVE_POINTS], true).unwrap())
            .unwrap();
        set.push(ChannelRecording::new(2, preamble(), vec![7; CURVE_POINTS], false).unwrap())
            .unwrap();

        let df = set.to_dataframe().unwrap();
        assert_eq!(df.height(), CURVE_POINTS);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["time", "ch1", "ch2"]);
    }

    #[test]
    fn empty_set_has_no_table() {
        assert!(MeasurementSet::new().to_dataframe().is_err());
    }
}
