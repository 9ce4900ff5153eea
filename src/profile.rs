use rustc_hash::FxHashMap;

use crate::{driver::Error, time::Delta};

/// Processing durations of a resource, keyed by item category.
///
/// A lookup of an unknown category yields a zero duration instead of failing.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "FxHashMap<String, f64>", into = "FxHashMap<String, f64>")]
pub struct DurationProfile {
    durations: FxHashMap<String, Delta>,
}

impl DurationProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the duration for `name`, returning the previous one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        duration: impl Into<Delta>,
    ) -> Result<Option<Delta>, Error> {
        let name = name.into();
        let duration = duration.into();
        if !duration.is_valid_duration() {
            return Err(Error::InvalidDuration {
                profile: name,
                value: duration.into_f64(),
            });
        }
        Ok(self.durations.insert(name, duration))
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, duration: impl Into<Delta>) -> Result<Self, Error> {
        self.insert(name, duration)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Delta> {
        self.durations.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> Delta {
        self.get(name).unwrap_or(Delta::ZERO)
    }

    delegate::delegate! {
        to self.durations {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
        }
    }
}

impl TryFrom<FxHashMap<String, f64>> for DurationProfile {
    type Error = Error;

    fn try_from(raw: FxHashMap<String, f64>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .try_fold(DurationProfile::new(), |profile, (name, secs)| {
                profile.with(name, secs)
            })
    }
}

impl From<DurationProfile> for FxHashMap<String, f64> {
    fn from(profile: DurationProfile) -> Self {
        profile
            .durations
            .into_iter()
            .map(|(name, d)| (name, d.into_f64()))
            .collect()
    }
}
