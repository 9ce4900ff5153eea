use std::{iter, path::PathBuf};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use tracing::{debug, warn};

use crate::{
    driver::Error,
    time::{Delta, Time},
};

/// How a schedule line listing several comma-separated values is treated.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, derivative::Derivative, serde::Serialize, serde::Deserialize,
)]
#[derivative(Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchLines {
    #[derivative(Default)]
    Reject,
    /// One item per listed value, all arriving together at the listed time. The values on a line
    /// must agree.
    Simultaneous,
}

/// Inter-arrival delays read from a newline-delimited arrival-time schedule.
///
/// Each line holds one absolute, non-decreasing arrival time; the delay of a line is its time
/// minus the time of the line before it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schedule {
    delays: Vec<Delta>,
}

impl Schedule {
    pub fn parse(text: &str, batch: BatchLines) -> Self {
        let mut delays = Vec::new();
        let mut last = Time::ZERO;
        for (idx, raw) in text.lines().enumerate() {
            let (lineno, line) = (idx + 1, raw.trim());
            if line.is_empty() {
                continue;
            }
            let parsed = if line.contains(',') {
                match batch {
                    BatchLines::Reject => {
                        warn!(lineno, line, "simultaneous arrivals are not supported, skipping line");
                        continue;
                    }
                    BatchLines::Simultaneous => {
                        let parsed = parse_batch(line);
                        if parsed.is_none() {
                            warn!(lineno, line, "simultaneous arrival line is malformed or its times disagree, skipping line");
                        }
                        parsed
                    }
                }
            } else {
                let parsed = parse_time(line).map(|at| (at, 1));
                if parsed.is_none() {
                    warn!(lineno, line, "unparsable arrival time, skipping line");
                }
                parsed
            };
            let Some((at, n)) = parsed else {
                continue;
            };
            let delay = at - last;
            if delay < Delta::ZERO {
                warn!(lineno, %at, %last, "arrival time goes backwards, clamping delay to zero");
            }
            if n > 1 {
                debug!(lineno, n, %at, "simultaneous arrivals");
            }
            delays.push(delay.max(Delta::ZERO));
            delays.extend(iter::repeat(Delta::ZERO).take(n - 1));
            last = at;
        }
        Self { delays }
    }

    pub fn read(path: impl Into<PathBuf>, batch: BatchLines) -> Result<Self, Error> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        let schedule = Self::parse(&text, batch);
        debug!(path = %path.display(), arrivals = schedule.len(), "schedule loaded");
        Ok(schedule)
    }

    pub fn delays(&self) -> &[Delta] {
        &self.delays
    }

    pub fn into_delays(self) -> Vec<Delta> {
        self.delays
    }

    delegate::delegate! {
        to self.delays {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
        }
    }
}

fn parse_time(field: &str) -> Option<Time> {
    match field.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(Time::new(value)),
        _ => None,
    }
}

// Every listed time must be the same instant.
fn parse_batch(line: &str) -> Option<(Time, usize)> {
    let mut fields = line.split(',').filter(|f| !f.trim().is_empty());
    let at = parse_time(fields.next()?)?;
    let mut n = 1;
    for field in fields {
        if parse_time(field)? != at {
            return None;
        }
        n += 1;
    }
    Some((at, n))
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Arrivals {
    File {
        path: PathBuf,
        #[serde(default)]
        batch_lines: BatchLines,
    },
    /// `count` arrivals with inter-arrival delays drawn uniformly from `[low, high]`.
    Uniform {
        low: f64,
        high: f64,
        count: usize,
        #[serde(default)]
        seed: u64,
    },
    /// `count` arrivals of a Poisson process with `rate` arrivals per time unit.
    Poisson {
        rate: f64,
        count: usize,
        #[serde(default)]
        seed: u64,
    },
}

impl Arrivals {
    pub fn delays(&self) -> Result<Vec<Delta>, Error> {
        match *self {
            Arrivals::File {
                ref path,
                batch_lines,
            } => Ok(Schedule::read(path.clone(), batch_lines)?.into_delays()),
            Arrivals::Uniform {
                low,
                high,
                count,
                seed,
            } => {
                if !(low.is_finite() && high.is_finite() && 0.0 <= low && low <= high) {
                    return Err(Error::InvalidArrivals(format!(
                        "uniform bounds [{low}, {high}]"
                    )));
                }
                let mut rng = StdRng::seed_from_u64(seed);
                Ok((0..count)
                    .map(|_| Delta::new(rng.gen_range(low..=high)))
                    .collect())
            }
            Arrivals::Poisson { rate, count, seed } => {
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(Error::InvalidArrivals(format!("poisson rate {rate}")));
                }
                let exp = Exp::new(rate).map_err(|e| Error::InvalidArrivals(e.to_string()))?;
                let mut rng = StdRng::seed_from_u64(seed);
                Ok((0..count)
                    .map(|_| Delta::new(exp.sample(&mut rng)))
                    .collect())
            }
        }
    }
}
