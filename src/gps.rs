//! GPS history aligned with the filtered accelerometer stream
//!
//! The FIR filter delays the accelerometer output, so every fix is held back
//! by `delay_samples` ticks before it enters the history. The history only
//! exists to support an event: without an event in progress, a poor fix wipes
//! it; during an event, a poor fix is recorded as an explicit gap.

use serde::{Deserialize, Serialize};

use crate::ring::RingBuffer;
use crate::types::GpsFixSample;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GpsEntryKind {
    Valid {
        speed_kmh: f64,
        bearing_deg: f64,
        altitude_m: f64,
    },
    /// No usable fix while an event was running
    Gap,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsEntry {
    pub rtc: f64,
    /// Accelerometer ticks between the previous entry and this one
    pub samples_since_previous: usize,
    pub kind: GpsEntryKind,
}

impl GpsEntry {
    pub fn is_gap(&self) -> bool {
        matches!(self.kind, GpsEntryKind::Gap)
    }
}

/// A valid entry with its position relative to the current tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignedFix {
    /// Ticks elapsed since the entry was recorded (1 = previous tick)
    pub age: usize,
    pub rtc: f64,
    pub speed_kmh: f64,
    pub bearing_deg: f64,
    pub altitude_m: f64,
}

impl AlignedFix {
    /// Horizontal velocity [m/s] as (north, east).
    pub fn velocity_ms(&self) -> (f64, f64) {
        let speed_ms = self.speed_kmh * 1000.0 / 3600.0;
        let bearing = self.bearing_deg.to_radians();
        (speed_ms * bearing.cos(), speed_ms * bearing.sin())
    }
}

pub struct GpsCorrelator {
    min_speed_kmh: f64,
    delay_samples: usize,
    delay_line: RingBuffer<(u64, Option<GpsFixSample>)>,
    entries: RingBuffer<GpsEntry>,
    samples_since_last: usize,
}

impl GpsCorrelator {
    pub fn new(min_speed_kmh: f64, delay_samples: usize, capacity: usize) -> Self {
        GpsCorrelator {
            min_speed_kmh,
            delay_samples,
            delay_line: RingBuffer::new(delay_samples),
            entries: RingBuffer::new(capacity),
            samples_since_last: 0,
        }
    }

    /// Record the fix current at raw tick `raw_index` and process the fix
    /// from tick `raw_index - delay_samples`, if there is one yet.
    pub fn ingest(&mut self, fix: Option<GpsFixSample>, raw_index: u64, event_active: bool) {
        if let Some((fix_index, delayed)) = self.delay_line.push((raw_index, fix)) {
            debug_assert_eq!(fix_index + self.delay_samples as u64, raw_index);
            self.process(delayed, event_active);
        }
        self.samples_since_last += 1;
    }

    fn process(&mut self, fix: Option<GpsFixSample>, event_active: bool) {
        match fix {
            Some(fix) if fix.is_reliable(self.min_speed_kmh) => {
                let duplicate = self.entries.last().is_some_and(|last| last.rtc == fix.rtc);
                if duplicate {
                    return;
                }
                let samples_since_previous = if self.entries.is_empty() {
                    0
                } else {
                    self.samples_since_last
                };
                self.append(GpsEntry {
                    rtc: fix.rtc,
                    samples_since_previous,
                    kind: GpsEntryKind::Valid {
                        speed_kmh: fix.speed_kmh,
                        bearing_deg: fix.bearing_deg,
                        altitude_m: fix.altitude_m,
                    },
                });
            }
            _ if !event_active => self.entries.clear(),
            unusable => {
                let Some(last) = self.entries.last().copied() else {
                    return;
                };
                let rtc = match unusable {
                    Some(fix) if fix.rtc != last.rtc => fix.rtc,
                    // Without a new timestamp only one gap marker is needed
                    _ if !last.is_gap() => last.rtc,
                    _ => return,
                };
                self.append(GpsEntry {
                    rtc,
                    samples_since_previous: self.samples_since_last,
                    kind: GpsEntryKind::Gap,
                });
            }
        }
    }

    fn append(&mut self, entry: GpsEntry) {
        if self.entries.push(entry).is_some() {
            log::trace!("GPS buffer full, evicted oldest entry");
        }
        self.samples_since_last = 0;
    }

    /// Called once an event has been solved: a trailing gap invalidates the history.
    pub fn on_event_end(&mut self) {
        if self.entries.last().is_some_and(GpsEntry::is_gap) {
            self.entries.clear();
        }
    }

    /// The newest run of valid entries, oldest first, with their ages.
    pub fn valid_suffix(&self) -> Vec<AlignedFix> {
        let mut age = self.samples_since_last;
        let mut suffix = Vec::new();
        for entry in self.entries.iter().rev() {
            let GpsEntryKind::Valid {
                speed_kmh,
                bearing_deg,
                altitude_m,
            } = entry.kind
            else {
                break;
            };
            suffix.push(AlignedFix {
                age,
                rtc: entry.rtc,
                speed_kmh,
                bearing_deg,
                altitude_m,
            });
            age += entry.samples_since_previous;
        }
        suffix.reverse();
        suffix
    }

    pub fn entries(&self) -> &RingBuffer<GpsEntry> {
        &self.entries
    }

    pub fn samples_since_last_entry(&self) -> usize {
        self.samples_since_last
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    pub fn reset(&mut self) {
        self.delay_line.clear();
        self.entries.clear();
        self.samples_since_last = 0;
    }
}
