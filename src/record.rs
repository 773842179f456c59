//! Batch record format
//!
//! One CSV row per accelerometer sample, with the GPS state current at that
//! sample. Accelerometer columns are raw readings in m/s²; GPS columns other
//! than the timestamp may be blank.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;
use std::str::FromStr;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::types::{AccelSample, FixQuality, GpsFixSample};

pub const HEADER: &str =
    "contreg,eixox,eixoy,eixoz,gps_fix,gps_speed,gps_direction,gps_alt,gps_rtc";

const FIELD_COUNT: usize = 9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub contreg: u64,
    /// Raw acceleration [m/s²]
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub gps_fix: Option<i32>,
    pub gps_speed: Option<f64>,
    pub gps_direction: Option<f64>,
    pub gps_alt: Option<f64>,
    pub gps_rtc: f64,
}

impl BatchRecord {
    /// Parse one data row. `line` is only used for error reporting.
    pub fn parse_line(text: &str, line: usize) -> TrackerResult<Self> {
        let fields: Vec<&str> = text.trim().split(',').map(str::trim).collect();
        if fields.len() != FIELD_COUNT {
            return Err(TrackerError::MalformedRecord {
                line,
                reason: format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
            });
        }

        Ok(BatchRecord {
            contreg: required(fields[0], "contreg", line)?,
            x: required_finite(fields[1], "eixox", line)?,
            y: required_finite(fields[2], "eixoy", line)?,
            z: required_finite(fields[3], "eixoz", line)?,
            gps_fix: optional(fields[4], "gps_fix", line)?,
            gps_speed: optional(fields[5], "gps_speed", line)?,
            gps_direction: optional(fields[6], "gps_direction", line)?,
            gps_alt: optional(fields[7], "gps_alt", line)?,
            gps_rtc: required_finite(fields[8], "gps_rtc", line)?,
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.contreg,
            self.x,
            self.y,
            self.z,
            blank_if_none(self.gps_fix),
            blank_if_none(self.gps_speed),
            blank_if_none(self.gps_direction),
            blank_if_none(self.gps_alt),
            self.gps_rtc
        )
    }

    /// The accelerometer reading in g units.
    pub fn accel_sample(&self, g_earth: f64) -> AccelSample {
        AccelSample::from_raw(self.contreg, self.x, self.y, self.z, g_earth)
    }

    /// The GPS state carried by this row, if the fix column is filled.
    /// Blank speed, direction or altitude read as zero.
    pub fn gps_fix(&self) -> Option<GpsFixSample> {
        let code = self.gps_fix?;
        Some(GpsFixSample::new(
            self.gps_speed.unwrap_or(0.0),
            self.gps_direction.unwrap_or(0.0),
            self.gps_alt.unwrap_or(0.0),
            self.gps_rtc,
            FixQuality::from_code(code),
        ))
    }
}

fn required<T: FromStr>(field: &str, name: &str, line: usize) -> TrackerResult<T> {
    if field.is_empty() {
        return Err(TrackerError::MalformedRecord {
            line,
            reason: format!("{} is blank", name),
        });
    }
    field.parse().map_err(|_| TrackerError::MalformedRecord {
        line,
        reason: format!("{} is not a number: {:?}", name, field),
    })
}

fn required_finite(field: &str, name: &str, line: usize) -> TrackerResult<f64> {
    let value: f64 = required(field, name, line)?;
    if !value.is_finite() {
        return Err(TrackerError::MalformedRecord {
            line,
            reason: format!("{} is not finite", name),
        });
    }
    Ok(value)
}

fn optional<T: FromStr>(field: &str, name: &str, line: usize) -> TrackerResult<Option<T>> {
    if field.is_empty() {
        Ok(None)
    } else {
        required(field, name, line).map(Some)
    }
}

fn blank_if_none<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Iterates over the data rows of a batch file.
///
/// A leading header row is consumed. Rows that fail to parse are skipped and
/// counted; only I/O errors are yielded as `Err`.
pub struct RecordReader<R> {
    lines: Lines<R>,
    line: usize,
    skipped: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        RecordReader {
            lines: reader.lines(),
            line: 0,
            skipped: 0,
        }
    }

    /// Rows dropped as malformed so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = TrackerResult<BatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;

            match classify_row(&text, self.line) {
                Row::Record(record) => return Some(Ok(record)),
                Row::Malformed => self.skipped += 1,
                Row::Blank | Row::Header => {}
            }
        }
    }
}

/// What one line of a batch file holds
#[derive(Clone, Debug, PartialEq)]
pub enum Row {
    Blank,
    /// The header on line 1
    Header,
    Record(BatchRecord),
    /// A data row that failed to parse
    Malformed,
}

/// Classify line number `line` (1-based) of a batch file.
pub fn classify_row(text: &str, line: usize) -> Row {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Row::Blank;
    }
    if line == 1 && trimmed.starts_with("contreg") {
        if trimmed != HEADER {
            log::warn!("Unexpected header, reading columns positionally: {}", trimmed);
        }
        return Row::Header;
    }

    match BatchRecord::parse_line(trimmed, line) {
        Ok(record) => Row::Record(record),
        Err(e) => {
            log::trace!("Skipping row: {}", e);
            Row::Malformed
        }
    }
}

pub struct RecordWriter<W: Write> {
    out: W,
}

impl<W: Write> RecordWriter<W> {
    /// Wrap `out` and write the header row.
    pub fn new(mut out: W) -> TrackerResult<Self> {
        writeln!(out, "{}", HEADER)?;
        Ok(RecordWriter { out })
    }

    pub fn write(&mut self, record: &BatchRecord) -> TrackerResult<()> {
        writeln!(self.out, "{}", record.to_line())?;
        Ok(())
    }

    pub fn flush(&mut self) -> TrackerResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// File target of [`create_writer`]
pub enum RecordSink {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl Write for RecordSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            RecordSink::Plain(w) => w.write(buf),
            RecordSink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            RecordSink::Plain(w) => w.flush(),
            RecordSink::Gzip(w) => w.flush(),
        }
    }
}

impl RecordWriter<RecordSink> {
    /// Flush and close the file, writing the gzip trailer for `*.gz` paths.
    /// Errors here mean the file is incomplete.
    pub fn finish(self) -> TrackerResult<()> {
        match self.out {
            RecordSink::Plain(mut w) => w.flush()?,
            RecordSink::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?;
            }
        }
        Ok(())
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

/// Open a batch file for reading, decompressing `*.gz` paths.
pub fn open_reader(path: &Path) -> TrackerResult<RecordReader<Box<dyn BufRead>>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gzip(path) {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(RecordReader::new(reader))
}

/// Create a batch file, gzip-compressed for `*.gz` paths. The header is
/// written immediately; call [`RecordWriter::finish`] when done.
pub fn create_writer(path: &Path) -> TrackerResult<RecordWriter<RecordSink>> {
    let file = File::create(path)?;
    let out = if is_gzip(path) {
        RecordSink::Gzip(BufWriter::new(GzEncoder::new(file, Compression::default())))
    } else {
        RecordSink::Plain(BufWriter::new(file))
    };
    RecordWriter::new(out)
}

/// Read every well-formed record from `path`, returning them with the number
/// of skipped rows.
pub fn load_records(path: &Path) -> TrackerResult<(Vec<BatchRecord>, usize)> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    for record in reader.by_ref() {
        records.push(record?);
    }
    Ok((records, reader.skipped()))
}
