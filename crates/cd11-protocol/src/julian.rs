//! Julian-date timestamp text (`YYYYDDD HH:MM:SS.mmm`).
//!
//! Timestamps travel as 20 bytes of text. Decoding keeps the text exactly
//! as received, even when it is not a real calendar instant; the helpers
//! here interpret it on demand for collaborators that need a time value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wire::{self, FieldReader};
use crate::ProtocolError;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A 20-character Julian-date timestamp as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JulianDate(String);

impl JulianDate {
    /// Width of the field on the wire.
    pub const LEN: usize = 20;

    /// Wraps wire text without interpreting it.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidField`] unless the text is exactly 20
    /// single-byte characters.
    pub fn from_text(text: impl Into<String>) -> Result<Self, ProtocolError> {
        let text = text.into();
        let len = wire::latin1_bytes("timestamp", &text)?.len();
        if len != Self::LEN {
            return Err(ProtocolError::invalid_field(
                "timestamp",
                format!("expected {} characters, got {len}", Self::LEN),
            ));
        }
        Ok(Self(text))
    }

    /// Formats a Unix timestamp in milliseconds.
    ///
    /// Returns `None` for instants outside years 0000 through 9999.
    pub fn from_unix_millis(millis: i64) -> Option<Self> {
        let days = millis.div_euclid(MILLIS_PER_DAY);
        let ms_of_day = millis.rem_euclid(MILLIS_PER_DAY);
        let year = year_from_days(days);
        if !(0..=9999).contains(&year) {
            return None;
        }
        let day_of_year = days - days_from_civil(year, 1, 1) + 1;
        let hours = ms_of_day / 3_600_000;
        let minutes = ms_of_day / 60_000 % 60;
        let seconds = ms_of_day / 1000 % 60;
        let ms = ms_of_day % 1000;
        Some(Self(format!(
            "{year:04}{day_of_year:03} {hours:02}:{minutes:02}:{seconds:02}.{ms:03}"
        )))
    }

    /// Interprets the text as a Unix timestamp in milliseconds.
    ///
    /// Returns `None` if the text is not a well-formed calendar instant.
    pub fn to_unix_millis(&self) -> Option<i64> {
        let b = self.0.as_bytes();
        if b.len() != Self::LEN
            || b[7] != b' '
            || b[10] != b':'
            || b[13] != b':'
            || b[16] != b'.'
        {
            return None;
        }
        let year = digits(&b[0..4])?;
        let day_of_year = digits(&b[4..7])?;
        let hours = digits(&b[8..10])?;
        let minutes = digits(&b[11..13])?;
        let seconds = digits(&b[14..16])?;
        let ms = digits(&b[17..20])?;

        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if !(1..=days_in_year).contains(&day_of_year)
            || hours > 23
            || minutes > 59
            || seconds > 59
        {
            return None;
        }

        let days = days_from_civil(year, 1, 1) + day_of_year - 1;
        Some(
            days * MILLIS_PER_DAY
                + hours * 3_600_000
                + minutes * 60_000
                + seconds * 1000
                + ms,
        )
    }

    /// True if the text names a real calendar instant.
    pub fn is_well_formed(&self) -> bool {
        self.to_unix_millis().is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn decode(
        reader: &mut FieldReader<'_>,
        field: &'static str,
    ) -> Result<Self, ProtocolError> {
        reader.read_raw_text(field, Self::LEN).map(Self)
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        wire::put_text(buf, "timestamp", &self.0, Self::LEN)
    }
}

impl fmt::Display for JulianDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Civil calendar arithmetic (proleptic Gregorian, days since 1970-01-01)
// ---------------------------------------------------------------------------

fn digits(bytes: &[u8]) -> Option<i64> {
    bytes.iter().try_fold(0i64, |acc, &b| {
        b.is_ascii_digit().then(|| acc * 10 + i64::from(b - b'0'))
    })
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let yoe = year - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn year_from_days(days: i64) -> i64 {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let year = yoe + era * 400;
    // mp counts months from March, so January and February fall in the
    // following civil year.
    if mp >= 10 { year + 1 } else { year }
}
