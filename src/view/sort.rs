use std::cmp::Ordering;

use crate::model::{Record, SortDirection};

/// Key a client-sorted column extracts from a row.
#[derive(Clone, Debug, PartialEq)]
pub enum SortValue {
    Null,
    Bool(bool),
    Number(f64),
    /// Stored lowercased so comparisons are case-insensitive.
    Text(String),
}

impl SortValue {
    pub fn text(s: impl AsRef<str>) -> Self {
        SortValue::Text(s.as_ref().to_lowercase())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SortValue::Null)
    }

    fn natural(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            // Mixed kinds: numbers before text before booleans.
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Number(_) => 0,
            SortValue::Text(_) => 1,
            SortValue::Bool(_) => 2,
            SortValue::Null => 3,
        }
    }
}

/// Nulls sort last ascending and first descending; everything else by natural order.
pub fn compare(a: &SortValue, b: &SortValue, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match direction {
            SortDirection::Ascending => Ordering::Greater,
            SortDirection::Descending => Ordering::Less,
        },
        (false, true) => match direction {
            SortDirection::Ascending => Ordering::Less,
            SortDirection::Descending => Ordering::Greater,
        },
        (false, false) => match direction {
            SortDirection::Ascending => a.natural(b),
            SortDirection::Descending => b.natural(a),
        },
    }
}

/// Stable in-place sort of one fetched page.
pub fn sort_records(
    records: &mut [Record],
    key: fn(&Record) -> SortValue,
    direction: SortDirection,
) {
    records.sort_by_cached_key(|r| KeyOrd(key(r), direction));
}

struct KeyOrd(SortValue, SortDirection);

impl PartialEq for KeyOrd {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyOrd {}

impl PartialOrd for KeyOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0, self.1)
    }
}
