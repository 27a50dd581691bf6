//! Strict parsers for loosely-typed request parameters.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};

use crate::{Error, Result};

pub const MAX_WINDOW_DAYS: u32 = 365;

/// Parse a boolean query flag.
///
/// `"true"`/`"1"` are true; `"false"`/`"0"`/`""` and absence are false.
/// Anything else is rejected rather than guessed at.
pub fn parse_flag(raw: Option<&str>) -> Result<bool> {
  match raw.map(str::trim) {
    None | Some("") | Some("false") | Some("0") => Ok(false),
    Some("true") | Some("1") => Ok(true),
    Some(other) => Err(Error::InvalidFlag(other.to_owned())),
  }
}

/// How far back interactions are considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Window {
  #[default]
  All,
  Days(u32),
}

impl Window {
  /// The earliest `created_at` admitted, or `None` for no bound.
  pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match self {
      Self::All => None,
      Self::Days(days) => Some(now - Duration::days(i64::from(*days))),
    }
  }

  pub fn parse(raw: Option<&str>) -> Result<Self> {
    match raw.map(str::trim) {
      None | Some("") => Ok(Self::All),
      Some(s) => s.parse(),
    }
  }
}

impl FromStr for Window {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    if s == "all" {
      return Ok(Self::All);
    }
    let days = s
      .strip_suffix('d')
      .and_then(|n| n.parse::<u32>().ok())
      .filter(|n| (1..=MAX_WINDOW_DAYS).contains(n))
      .ok_or_else(|| Error::InvalidWindow(s.to_owned()))?;
    Ok(Self::Days(days))
  }
}

impl fmt::Display for Window {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::All => f.write_str("all"),
      Self::Days(d) => write!(f, "{d}d"),
    }
  }
}
