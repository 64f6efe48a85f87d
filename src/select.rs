//! Picks the newest `vehicle_data_<YYYYMMDD>.csv` out of the staging directory.
//!
//! Filenames are sorted as plain strings and the last one wins. That only equals
//! chronological order because the stamp is a fixed-width, zero-padded `YYYYMMDD`;
//! a stamp like `2023115` would sort after `20231101` and is rejected as malformed
//! if it ever ends up last.

use chrono::{Days, NaiveDate};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info};

use crate::errors::{FleetError, Result};

pub const FILE_PREFIX: &str = "vehicle_data_";
pub const FILE_SUFFIX: &str = ".csv";

/// A downloaded file chosen for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub date: NaiveDate,
    /// The raw `YYYYMMDD` stamp from the filename.
    pub stamp: String,
}

impl StagedFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// How old the newest file may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Unlimited,
    /// Accept `today` back through `today - n` inclusive.
    WithinDays(u32),
}

impl Freshness {
    /// `days <= 0` turns the check off.
    pub fn from_days(days: i64) -> Self {
        if days <= 0 {
            Freshness::Unlimited
        } else {
            Freshness::WithinDays(u32::try_from(days).unwrap_or(u32::MAX))
        }
    }

    pub fn accepts(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Freshness::Unlimited => true,
            Freshness::WithinDays(n) => {
                if date > today {
                    return false;
                }
                match today.checked_sub_days(Days::new(u64::from(*n))) {
                    Some(earliest) => date >= earliest,
                    None => true,
                }
            }
        }
    }
}

fn candidate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^vehicle_data_.*\.csv$").expect("candidate filename pattern is valid")
    })
}

/// Names of all files in `dir` matching `vehicle_data_*.csv`, sorted ascending.
pub fn list_candidates(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = fs::read_dir(dir).map_err(|source| {
        error!(dir = %dir.display(), "Can't list candidate directory: {source}");
        FleetError::ReadDir {
            dir: dir.to_path_buf(),
            source,
        }
    })?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if candidate_pattern().is_match(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Parse the 8-digit stamp out of `vehicle_data_YYYYMMDD.csv`.
pub fn parse_file_date(file_name: &str) -> Result<(NaiveDate, String)> {
    let malformed = |reason: &str| FleetError::MalformedFileDate {
        file: file_name.to_string(),
        reason: reason.to_string(),
    };

    let stamp = file_name
        .strip_prefix(FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
        .ok_or_else(|| malformed("name does not match vehicle_data_<YYYYMMDD>.csv"))?;

    if stamp.len() != 8 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("date stamp must be exactly 8 digits"));
    }

    let year: i32 = stamp[0..4].parse().map_err(|_| malformed("bad year"))?;
    let month: u32 = stamp[4..6].parse().map_err(|_| malformed("bad month"))?;
    let day: u32 = stamp[6..8].parse().map_err(|_| malformed("bad day"))?;

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| malformed("not a valid calendar date"))?;
    Ok((date, stamp.to_string()))
}

/// Return the newest candidate in `dir`, failing if there is none, its stamp is
/// malformed, or it falls outside `freshness` relative to `today`.
pub fn select_latest(dir: &Path, freshness: Freshness, today: NaiveDate) -> Result<StagedFile> {
    let candidates = list_candidates(dir)?;
    debug!(dir = %dir.display(), count = candidates.len(), "Listed candidate csvs");

    let Some(latest) = candidates.last() else {
        error!(dir = %dir.display(), "Can't get last \"vehicle_data_*.csv\" file, are there any csv files?");
        return Err(FleetError::NoCandidateFiles {
            dir: dir.to_path_buf(),
        });
    };

    let (date, stamp) = parse_file_date(latest).inspect_err(|e| {
        error!(file = %latest, error = %e, "Can't parse date from last csv");
    })?;

    if !freshness.accepts(date, today) {
        let window_days = match freshness {
            Freshness::WithinDays(n) => n,
            Freshness::Unlimited => 0,
        };
        let err = FleetError::StaleFile {
            file: latest.clone(),
            window_days,
            today,
        };
        error!(file = %latest, %date, %today, window_days, "Latest csv is outside the freshness window");
        return Err(err);
    }

    let staged = StagedFile {
        path: dir.join(latest),
        date,
        stamp,
    };
    info!(path = %staged.path.display(), %date, "Selected latest csv");
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_zero_padded_stamp() {
        let (date, stamp) = parse_file_date("vehicle_data_20230105.csv").unwrap();
        assert_eq!(date, ymd(2023, 1, 5));
        assert_eq!(stamp, "20230105");
    }

    #[test]
    fn rejects_short_non_numeric_and_impossible_stamps() {
        for name in [
            "vehicle_data_2023015.csv",
            "vehicle_data_202301155.csv",
            "vehicle_data_2023O115.csv",
            "vehicle_data_20231345.csv",
            "vehicle_data_20230230.csv",
            "vehicle_data_.csv",
            "vehicle_data_+2023011.csv",
        ] {
            let err = parse_file_date(name).unwrap_err();
            assert!(
                matches!(err, FleetError::MalformedFileDate { ref file, .. } if file == name),
                "{name} should be malformed, got {err:?}"
            );
        }
    }

    #[test]
    fn freshness_window_is_inclusive() {
        let today = ymd(2023, 1, 15);
        let window = Freshness::from_days(3);
        assert!(window.accepts(today, today));
        assert!(window.accepts(ymd(2023, 1, 12), today));
        assert!(!window.accepts(ymd(2023, 1, 11), today));
        assert!(!window.accepts(ymd(2023, 1, 16), today));
    }

    #[test]
    fn non_positive_window_disables_check() {
        assert_eq!(Freshness::from_days(0), Freshness::Unlimited);
        assert_eq!(Freshness::from_days(-1), Freshness::Unlimited);
        assert!(Freshness::Unlimited.accepts(ymd(1999, 12, 31), ymd(2023, 1, 15)));
    }
}
