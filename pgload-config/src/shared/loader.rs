use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::Config;
use crate::shared::{PgConnectionConfig, PipelineConfig, ValidationError};

/// What happens to a row whose mapped columns are not all present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingColumnPolicy {
    /// Missing positions are bound as SQL `NULL`.
    #[default]
    BindNull,
    /// Rows with at least one missing position are not written.
    SkipRow,
}

/// Column and constant mappings turning a CSV record into statement parameters.
///
/// Both maps iterate in ascending key order, which fixes the position of every constant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MappingConfig {
    /// Column name to CSV field index; the index is also the parameter position.
    #[serde(default)]
    pub column_mapping: BTreeMap<String, usize>,
    /// Column name to literal value, placed after the column-mapped positions.
    #[serde(default)]
    pub custom_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub missing_column_policy: MissingColumnPolicy,
}

impl MappingConfig {
    /// Length of every parameter list built from this mapping.
    pub fn parameter_count(&self) -> usize {
        self.column_mapping.len() + self.custom_mapping.len()
    }

    /// Ensures mapped positions stay inside the column-mapped region.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.parameter_count() == 0 {
            return Err(ValidationError::EmptyMapping);
        }

        let mapped = self.column_mapping.len();
        for (column, &index) in &self.column_mapping {
            if index >= mapped {
                return Err(ValidationError::ColumnIndexOutOfRange {
                    column: column.clone(),
                    index,
                    mapped,
                });
            }
        }

        Ok(())
    }
}

/// CSV reader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CsvConfig {
    /// When `true`, the first record is a header and is not loaded.
    #[serde(default)]
    pub has_headers: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl CsvConfig {
    /// Returns the delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8, ValidationError> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(ValidationError::InvalidDelimiter(self.delimiter.clone())),
        }
    }
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            has_headers: false,
            delimiter: default_delimiter(),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// Top-level configuration of the `load` command.
///
/// Intentionally not [`Serialize`] since it embeds the database password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoaderConfig {
    pub pg_connection: PgConnectionConfig,
    pub csv_file: PathBuf,
    #[serde(default)]
    pub csv: CsvConfig,
    /// Target table, used to label logs and the completion report.
    pub table_name: String,
    /// Statement executed once per row with `$1..$n` positional parameters.
    pub sql_statement: String,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(flatten)]
    pub mapping: MappingConfig,
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pg_connection.tls.validate()?;
        self.pipeline.validate()?;
        self.mapping.validate()?;
        self.csv.delimiter_byte()?;

        if self.sql_statement.trim().is_empty() {
            return Err(ValidationError::EmptyStatement);
        }

        Ok(())
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
