//! Keyset pagination primitives.
//!
//! Listings page by keyset, not offset: the caller passes the last row's
//! (order value, tie-break value) pair back as the boundary for the next
//! page. The tie-break column is always applied as a secondary sort key so
//! rows with identical order values have a total, reproducible order.

use std::str::FromStr;

use super::errors::StorageError;

/// Sort direction for paginated listings. Closed two-value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Row comparator selecting rows strictly after the boundary in sort
    /// order.
    pub(crate) fn comparator(self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }
}

impl FromStr for SortOrder {
    type Err = StorageError;

    /// Accepts exactly `"ASC"` or `"DESC"` (case-insensitive). Anything
    /// else fails with [`StorageError::InvalidArgument`] before any query
    /// executes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(StorageError::InvalidArgument(format!(
                "unrecognized sort order: {other}"
            ))),
        }
    }
}

/// Exclusive paging boundary: the order value and tie-break value of the
/// last row the caller has already seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageBoundary {
    pub order_value: i64,
    pub tie_break: String,
}

impl PageBoundary {
    pub fn new(order_value: i64, tie_break: impl Into<String>) -> Self {
        Self {
            order_value,
            tie_break: tie_break.into(),
        }
    }
}

/// SQL fragments for a keyset-paginated listing over an order column and a
/// tie-break column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Keyset<'a> {
    pub order_col: &'a str,
    pub tie_col: &'a str,
    pub order: SortOrder,
}

impl Keyset<'_> {
    /// Row-comparison predicate selecting rows strictly after a boundary
    /// bound at `$first_param` / `$first_param + 1`.
    pub fn boundary_predicate(&self, first_param: usize) -> String {
        format!(
            "({}, {}) {} (${}, ${})",
            self.order_col,
            self.tie_col,
            self.order.comparator(),
            first_param,
            first_param + 1
        )
    }

    /// ORDER BY clause applying the tie-break as the secondary key, in the
    /// same direction as the primary order.
    pub fn order_by(&self) -> String {
        let dir = self.order.as_sql();
        format!(
            "ORDER BY {} {}, {} {}",
            self.order_col, dir, self.tie_col, dir
        )
    }
}

/// A positive row limit, checked before any query executes.
pub(crate) fn validate_limit(limit: i64) -> Result<(), StorageError> {
    if limit <= 0 {
        return Err(StorageError::InvalidArgument(format!(
            "limit must be positive, got {limit}"
        )));
    }
    Ok(())
}
