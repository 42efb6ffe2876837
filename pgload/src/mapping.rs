//! Translation of CSV rows into positional statement parameters.
//!
//! A [`RowMapper`] is built once from a [`MappingConfig`] and turns each [`Row`] into a
//! [`ParameterList`] of fixed length `|column_mapping| + |custom_mapping|`. Column-mapped
//! values land at their field index, constants follow in ascending name order. Fields missing
//! from a short row are recorded as [`Parameter::Absent`] together with a [`MappingGap`].

use pgload_config::shared::{MappingConfig, MissingColumnPolicy};
use std::fmt;
use tracing::warn;

/// One input record, as an ordered list of text fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Row {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Row::new(iter.into_iter().map(Into::into).collect())
    }
}

/// A single positional statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Value(String),
    /// No value was available for this position.
    Absent,
}

impl Parameter {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Parameter::Value(value) => Some(value),
            Parameter::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Parameter::Absent)
    }
}

/// Ordered parameters for one sink invocation.
///
/// The list is built once by the mapper and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterList {
    parameters: Vec<Parameter>,
}

impl ParameterList {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn get(&self, position: usize) -> Option<&Parameter> {
        self.parameters.get(position)
    }

    /// Number of positions holding an actual value.
    pub fn usable_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.is_absent()).count()
    }
}

/// A mapped column whose field index is past the end of the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingGap {
    /// 1-based number of the input row.
    pub row_number: usize,
    pub column: String,
    pub index: usize,
    pub row_len: usize,
}

impl fmt::Display for MappingGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: missing value for column '{}' (index {}, row has {} fields)",
            self.row_number, self.column, self.index, self.row_len
        )
    }
}

/// Outcome of mapping one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRow {
    pub parameters: ParameterList,
    pub gaps: Vec<MappingGap>,
}

/// Why a mapped row is not handed to the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No position holds a value.
    NoUsableValues,
    /// Some positions are missing and the policy is [`MissingColumnPolicy::SkipRow`].
    MissingColumns,
}

#[derive(Debug, Clone)]
pub struct RowMapper {
    /// `(column name, field index)` in ascending column name order.
    columns: Vec<(String, usize)>,
    /// Constant values in ascending column name order.
    constants: Vec<String>,
    policy: MissingColumnPolicy,
}

impl RowMapper {
    /// Builds a mapper from validated mapping settings.
    ///
    /// Indices are expected to be inside the column-mapped region, see
    /// [`MappingConfig::validate`]. Indices past the end of the parameter list are treated like
    /// missing fields rather than panicking.
    pub fn new(config: &MappingConfig) -> Self {
        Self {
            columns: config
                .column_mapping
                .iter()
                .map(|(name, index)| (name.clone(), *index))
                .collect(),
            constants: config.custom_mapping.values().cloned().collect(),
            policy: config.missing_column_policy,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.columns.len() + self.constants.len()
    }

    /// Maps `row`, numbered `row_number` (1-based) for diagnostics.
    ///
    /// Every missing field is logged and reported as a [`MappingGap`], the remaining positions
    /// are filled normally.
    pub fn map_row(&self, row_number: usize, row: &Row) -> MappedRow {
        let mut parameters = vec![Parameter::Absent; self.parameter_count()];
        let mut gaps = Vec::new();

        for (column, index) in &self.columns {
            match (row.get(*index), parameters.get_mut(*index)) {
                (Some(value), Some(slot)) => *slot = Parameter::Value(value.to_owned()),
                _ => {
                    let gap = MappingGap {
                        row_number,
                        column: column.clone(),
                        index: *index,
                        row_len: row.len(),
                    };
                    warn!(
                        row_number,
                        column = %gap.column,
                        index = gap.index,
                        "skipping column, row has no value at the mapped index"
                    );
                    gaps.push(gap);
                }
            }
        }

        let constants_start = self.columns.len();
        for (offset, value) in self.constants.iter().enumerate() {
            parameters[constants_start + offset] = Parameter::Value(value.clone());
        }

        MappedRow {
            parameters: ParameterList::new(parameters),
            gaps,
        }
    }

    /// Decides whether a mapped row is enqueued.
    pub fn skip_reason(&self, mapped: &MappedRow) -> Option<SkipReason> {
        if mapped.parameters.usable_count() == 0 {
            return Some(SkipReason::NoUsableValues);
        }

        if !mapped.gaps.is_empty() && self.policy == MissingColumnPolicy::SkipRow {
            return Some(SkipReason::MissingColumns);
        }

        None
    }

    /// Lazily maps `rows`, yielding only the parameter lists that should be written.
    pub fn map_rows<'a>(&'a self, rows: &'a [Row]) -> MappedRows<'a> {
        MappedRows {
            mapper: self,
            rows: rows.iter().enumerate(),
            stats: MappingStats::default(),
        }
    }
}

/// Counters collected while mapping a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingStats {
    pub rows_mapped: u64,
    pub rows_skipped: u64,
    pub gaps: u64,
}

/// Iterator produced by [`RowMapper::map_rows`].
#[derive(Debug)]
pub struct MappedRows<'a> {
    mapper: &'a RowMapper,
    rows: std::iter::Enumerate<std::slice::Iter<'a, Row>>,
    stats: MappingStats,
}

impl MappedRows<'_> {
    /// Statistics of the rows consumed so far.
    pub fn stats(&self) -> MappingStats {
        self.stats
    }
}

impl Iterator for MappedRows<'_> {
    type Item = ParameterList;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, row) in self.rows.by_ref() {
            let row_number = index + 1;
            let mapped = self.mapper.map_row(row_number, row);

            self.stats.rows_mapped += 1;
            self.stats.gaps += mapped.gaps.len() as u64;

            if let Some(reason) = self.mapper.skip_reason(&mapped) {
                warn!(row_number, ?reason, "row not written");
                self.stats.rows_skipped += 1;
                continue;
            }

            return Some(mapped.parameters);
        }

        None
    }
}
