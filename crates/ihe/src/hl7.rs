//! HL7 `DTM` timestamp parsing.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

/// Parses an HL7 `DTM` value (`YYYY[MM[DD[HH[MM[SS[.S+]]]]]][+/-ZZZZ]`) to UTC.
///
/// Missing components default to the start of the period. Values without an offset are taken
/// as UTC. RFC 3339 strings are accepted too, since some registries send those instead.
/// Anything else yields `None`.
pub(crate) fn parse_dtm(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    let (body, offset) = match value.rfind(['+', '-']) {
        Some(idx) => (&value[..idx], Some(parse_offset(&value[idx..])?)),
        None => (value, None),
    };
    let (digits, fraction) = match body.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (body, None),
    };

    if !matches!(digits.len(), 4 | 6 | 8 | 10 | 12 | 14)
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    if fraction.is_some() && digits.len() != 14 {
        return None;
    }

    let part = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(s) => s.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits[..4].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, part(4, 1)?, part(6, 1)?)?;
    let naive = date.and_hms_nano_opt(part(8, 0)?, part(10, 0)?, part(12, 0)?, nanos(fraction)?)?;

    match offset {
        Some(offset) => offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        None => Some(Utc.from_utc_datetime(&naive)),
    }
}

fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let (sign, rest) = offset.split_at(1);
    if rest.len() != 4 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = rest[..2].parse().ok()?;
    let minutes: i32 = rest[2..].parse().ok()?;
    let seconds = hours * 3600 + minutes * 60;
    match sign {
        "+" => FixedOffset::east_opt(seconds),
        _ => FixedOffset::west_opt(seconds),
    }
}

fn nanos(fraction: Option<&str>) -> Option<u32> {
    let Some(fraction) = fraction else {
        return Some(0);
    };
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let truncated = &fraction[..fraction.len().min(9)];
    let scale = 10u32.pow(9 - truncated.len() as u32);
    truncated.parse::<u32>().ok().map(|n| n * scale)
}
