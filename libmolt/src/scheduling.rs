//! Time expression parsing for scheduled posts
//!
//! Two forms are accepted:
//! - Relative offsets: `+30m`, `+1h`, `+2d`
//! - Absolute local times: `2025-11-20 15:00`
//!
//! Anything else is rejected with [`MoltError::InvalidTimeExpression`].

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};

use crate::error::{MoltError, Result};

const ABSOLUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "m" => Some(TimeUnit::Minutes),
            "h" => Some(TimeUnit::Hours),
            "d" => Some(TimeUnit::Days),
            _ => None,
        }
    }

    fn duration(&self, amount: i64) -> Option<Duration> {
        match self {
            TimeUnit::Minutes => Duration::try_minutes(amount),
            TimeUnit::Hours => Duration::try_hours(amount),
            TimeUnit::Days => Duration::try_days(amount),
        }
    }
}

/// A parsed time expression, not yet anchored to a clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeExpression {
    RelativeOffset { amount: i64, unit: TimeUnit },
    AbsoluteInstant(DateTime<Utc>),
}

impl TimeExpression {
    /// Parse an expression, interpreting absolute times in the local timezone
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_in(input, &Local)
    }

    /// Parse an expression, interpreting absolute times in `tz`
    pub fn parse_in<Tz: TimeZone>(input: &str, tz: &Tz) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MoltError::invalid_time(input, "expression is empty"));
        }

        match trimmed.strip_prefix('+') {
            Some(rest) => parse_relative(input, rest),
            None => parse_absolute(input, trimmed, tz),
        }
    }

    /// Anchor the expression to `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match *self {
            TimeExpression::AbsoluteInstant(at) => Ok(at),
            TimeExpression::RelativeOffset { amount, unit } => unit
                .duration(amount)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or_else(|| {
                    MoltError::invalid_time(
                        &format!("+{}", amount),
                        "offset is out of range",
                    )
                }),
        }
    }
}

/// Parse and resolve an expression against the current time
///
/// The clock is read once; the returned instant is stable for whatever
/// checks the caller performs next.
pub fn parse_time_expression(input: &str) -> Result<DateTime<Utc>> {
    parse_time_expression_at(input, Utc::now())
}

/// Parse and resolve an expression against a caller-supplied `now`
pub fn parse_time_expression_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    TimeExpression::parse(input)?.resolve(now)
}

fn parse_relative(input: &str, rest: &str) -> Result<TimeExpression> {
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (magnitude, suffix) = rest.split_at(digits_end);

    if magnitude.is_empty() {
        return Err(MoltError::invalid_time(
            input,
            "magnitude must be a whole number",
        ));
    }
    if suffix.is_empty() {
        return Err(MoltError::invalid_time(input, "missing unit"));
    }

    let unit = TimeUnit::from_suffix(suffix)
        .ok_or_else(|| MoltError::invalid_time(input, format!("unknown unit '{}'", suffix)))?;
    let amount: i64 = magnitude
        .parse()
        .map_err(|_| MoltError::invalid_time(input, "magnitude is too large"))?;

    Ok(TimeExpression::RelativeOffset { amount, unit })
}

fn parse_absolute<Tz: TimeZone>(input: &str, trimmed: &str, tz: &Tz) -> Result<TimeExpression> {
    let naive = NaiveDateTime::parse_from_str(trimmed, ABSOLUTE_FORMAT)
        .map_err(|e| MoltError::invalid_time(input, format!("malformed date: {}", e)))?;

    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| MoltError::invalid_time(input, "time does not exist in the local timezone"))?;

    Ok(TimeExpression::AbsoluteInstant(local.with_timezone(&Utc)))
}
