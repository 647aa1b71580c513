//! crates/shop_bot_core/src/money.rs
//!
//! Monetary amounts, kept in minor units (kopecks, cents) to avoid float drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Parses amounts the way the backend formats them: `"1 200.50р."`, `"$12.00"`,
    /// `"300"`, `"99,9"`. Currency symbols and grouping spaces are ignored; a trailing
    /// `.` or `,` followed by one or two digits is the fractional part.
    pub fn parse_lenient(raw: &str) -> Option<Money> {
        let negative = raw.trim_start().starts_with('-');
        let kept: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
            .collect();
        let kept = kept.trim_matches(|c| c == '.' || c == ',');
        if kept.is_empty() {
            return None;
        }

        let (whole, fraction) = match kept.rfind(|c| c == '.' || c == ',') {
            Some(pos) => {
                let tail = &kept[pos + 1..];
                if (1..=2).contains(&tail.len()) || tail.len() == 4 {
                    (&kept[..pos], tail)
                } else {
                    (kept, "")
                }
            }
            None => (kept, ""),
        };

        let whole_digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
        let major: i64 = if whole_digits.is_empty() {
            0
        } else {
            whole_digits.parse().ok()?
        };
        // Four fractional digits show up in raw DECIMAL(15,4) columns.
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().ok()? * 10,
            2 => fraction.parse().ok()?,
            _ => fraction[..2].parse().ok()?,
        };

        let minor = major.checked_mul(100)?.checked_add(cents)?;
        Some(Money(if negative { -minor } else { minor }))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}
