//! Point-in-time aggregates over a time window of samples.

use crate::sample::{Sample, TimeOfDay};

/// Inclusive time-of-day window. Either bound may be absent; a start after
/// the end means the window wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub start: Option<TimeOfDay>,
    pub end: Option<TimeOfDay>,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn since(start: TimeOfDay) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn between(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, time: TimeOfDay) -> bool {
        let t = time.seconds_of_day();
        match (self.start, self.end) {
            (None, None) => true,
            (Some(start), None) => t >= start.seconds_of_day(),
            (None, Some(end)) => t <= end.seconds_of_day(),
            (Some(start), Some(end)) => {
                let t1 = start.seconds_of_day();
                let t2 = end.seconds_of_day();
                if t1 <= t2 {
                    t >= t1 && t <= t2
                } else {
                    // Wraps past midnight.
                    t >= t1 || t <= t2
                }
            }
        }
    }
}

/// Min/max/truncated-mean triple for one measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub min: u8,
    pub max: u8,
    pub mean: u8,
}

/// Aggregates over the entries matching a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregates {
    pub matched: usize,
    pub temperature: Stats,
    pub luminosity: Stats,
}

/// Compute temperature and luminosity statistics over the samples inside
/// `window`. `None` when nothing matches — zero matches are a failure, not
/// a zeroed aggregate.
pub fn summarize<'a, I>(samples: I, window: &TimeWindow) -> Option<Aggregates>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut matched = 0usize;
    let mut temp = (u8::MAX, u8::MIN, 0u32);
    let mut lum = (u8::MAX, u8::MIN, 0u32);
    for sample in samples {
        if !window.contains(sample.time_of_day()) {
            continue;
        }
        matched += 1;
        temp.0 = temp.0.min(sample.temperature);
        temp.1 = temp.1.max(sample.temperature);
        temp.2 += u32::from(sample.temperature);
        lum.0 = lum.0.min(sample.luminosity);
        lum.1 = lum.1.max(sample.luminosity);
        lum.2 += u32::from(sample.luminosity);
    }
    if matched == 0 {
        return None;
    }
    let count = matched as u32;
    Some(Aggregates {
        matched,
        temperature: Stats {
            min: temp.0,
            max: temp.1,
            mean: (temp.2 / count) as u8,
        },
        luminosity: Stats {
            min: lum.0,
            max: lum.1,
            mean: (lum.2 / count) as u8,
        },
    })
}
