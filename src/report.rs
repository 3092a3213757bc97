//! Diagnostic report structures and verdict aggregation

use crate::endpoints::CRITICAL_CHECKS;
use crate::errors::Result;
use crate::fetcher::FetchResult;
use chrono::{DateTime, SubsecRound, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Per-check results in probe order
pub type CheckResults = IndexMap<String, FetchResult>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Verdict {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Verdict {
    /// OK only when every critical check is present and succeeded
    pub fn from_results(results: &CheckResults) -> Self {
        let healthy = CRITICAL_CHECKS
            .iter()
            .all(|name| results.get(*name).is_some_and(|result| result.ok));

        if healthy { Verdict::Ok } else { Verdict::Fail }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Outcome of one full diagnostic run
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(with = "iso_millis")]
    pub started: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub finished: DateTime<Utc>,
    pub frontend_origin: String,
    pub backend_base: String,
    pub verdict: Verdict,
    pub results: CheckResults,
}

impl Report {
    pub fn new(
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
        frontend_origin: String,
        backend_base: String,
        results: CheckResults,
    ) -> Self {
        // the JSON form only carries milliseconds
        let started = started.trunc_subsecs(3);
        let finished = finished.trunc_subsecs(3);
        Self {
            started,
            // wall clock may step backwards mid-run
            finished: finished.max(started),
            frontend_origin,
            backend_base,
            verdict: Verdict::from_results(&results),
            results,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.verdict == Verdict::Ok
    }

    /// Indented JSON, as copied to the clipboard
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn failed_checks(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, result)| !result.ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// ISO-8601 UTC timestamps with exactly three fractional digits, e.g. `2025-03-01T12:00:00.420Z`
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|stamp| stamp.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Source of wall-clock time for report timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
