//! Parsing of Go-style duration strings (`"0"`, `"30s"`, `"1h30m"`, `"1.5m"`),
//! the format the platform configuration uses for intervals.

use std::time::Duration;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,

    #[error("negative durations are not allowed")]
    Negative,

    #[error("invalid unit {0:?}, expected one of ns, us, ms, s, m or h")]
    InvalidUnit(String),

    #[error("missing a unit, expected one of ns, us, ms, s, m or h")]
    NoUnit,

    #[error("invalid number: {0}")]
    NotANumber(#[from] std::num::ParseFloatError),

    #[error("duration is too large")]
    Overflow,
}

fn unit_base(unit: &str) -> Result<Duration, DurationParseError> {
    const MINUTE: Duration = Duration::from_secs(60);
    match unit {
        "ns" => Ok(Duration::from_nanos(1)),
        // micro sign (U+00B5) and greek mu (U+03BC) are both accepted
        "us" | "\u{00b5}s" | "\u{03bc}s" => Ok(Duration::from_micros(1)),
        "ms" => Ok(Duration::from_millis(1)),
        "s" => Ok(Duration::from_secs(1)),
        "m" => Ok(MINUTE),
        "h" => Ok(MINUTE * 60),
        other => Err(DurationParseError::InvalidUnit(other.to_string())),
    }
}

pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if rest.starts_with('-') {
        return Err(DurationParseError::Negative);
    }
    rest = rest.trim_start_matches('+');

    // A bare zero is the only unitless value
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let unit_start = rest
            .find(|c: char| c.is_alphabetic())
            .ok_or(DurationParseError::NoUnit)?;
        let (value, tail) = rest.split_at(unit_start);
        let value = value.parse::<f64>()?;

        let unit_end = tail
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        if value.is_sign_negative() {
            return Err(DurationParseError::Negative);
        }
        let segment = Duration::try_from_secs_f64(unit_base(unit)?.as_secs_f64() * value)
            .map_err(|_| DurationParseError::Overflow)?;
        total = total
            .checked_add(segment)
            .ok_or(DurationParseError::Overflow)?;
        rest = tail;
    }

    Ok(total)
}
