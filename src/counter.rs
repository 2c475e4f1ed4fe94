/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::str::FromStr;

/// External storage classification assigned to a counter by the host runtime.
/// Only durable counters are forwarded to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterStorage {
    Transient,
    Log,
    Durable,
}

impl CounterStorage {
    #[inline]
    pub fn is_durable(&self) -> bool {
        matches!(self, CounterStorage::Durable)
    }
}

/// String formatted counter value as exported by the host, tagged with the
/// representation the host selected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterValue {
    Delta(String),
    Absolute(String),
}

impl CounterValue {
    fn as_str(&self) -> &str {
        match self {
            CounterValue::Delta(s) => s,
            CounterValue::Absolute(s) => s,
        }
    }

    #[inline]
    pub fn is_delta(&self) -> bool {
        matches!(self, CounterValue::Delta(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    pub name: String,
    pub storage: CounterStorage,
    pub value: CounterValue,
}

impl CounterRecord {
    pub fn delta(name: impl Into<String>, storage: CounterStorage, value: impl Into<String>) -> Self {
        CounterRecord {
            name: name.into(),
            storage,
            value: CounterValue::Delta(value.into()),
        }
    }

    pub fn absolute(
        name: impl Into<String>,
        storage: CounterStorage,
        value: impl Into<String>,
    ) -> Self {
        CounterRecord {
            name: name.into(),
            storage,
            value: CounterValue::Absolute(value.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Delta,
    Absolute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCounter {
    pub name: String,
    pub value: f64,
    pub kind: CounterKind,
}

/// Normalize a counter record into an emittable metric.
///
/// Returns `None` when the value does not parse as a number. That is an
/// expected condition, not an error: upstream counters may carry text.
pub fn normalize(record: &CounterRecord) -> Option<NormalizedCounter> {
    let value = parse_invariant_f64(record.value.as_str())?;
    let kind = if record.value.is_delta() {
        CounterKind::Delta
    } else {
        CounterKind::Absolute
    };
    Some(NormalizedCounter {
        name: record.name.to_lowercase(),
        value,
        kind,
    })
}

/// Invariant number parsing: optional surrounding whitespace, optional
/// leading sign, digit grouping commas between integer digits, a decimal
/// point. No exponent notation, no non-finite values.
fn parse_invariant_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (sign, digits) = match s.as_bytes()[0] {
        b'+' | b'-' => (&s[..1], &s[1..]),
        _ => ("", s),
    };
    if digits.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    if let Some(frac) = frac_part {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let mut cleaned = String::with_capacity(s.len());
    cleaned.push_str(sign);
    let bytes = int_part.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'0'..=b'9' => cleaned.push(b as char),
            b',' => {
                // grouping separator, only valid between two digits
                let prev = i > 0 && bytes[i - 1].is_ascii_digit();
                let next = bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                if !prev || !next {
                    return None;
                }
            }
            _ => return None,
        }
    }
    if let Some(frac) = frac_part {
        cleaned.push('.');
        cleaned.push_str(frac);
    }

    f64::from_str(&cleaned).ok().filter(|v| v.is_finite())
}
