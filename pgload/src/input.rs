//! Reading of CSV input into memory.

use pgload_config::shared::CsvConfig;
use std::io;
use std::path::Path;
use tracing::info;

use crate::error::{ErrorKind, LoadResult};
use crate::load_error;
use crate::mapping::Row;

/// Reads every record of the CSV file at `path`.
///
/// Records may have different lengths; short records are handled by the mapper.
pub fn read_csv_file(path: &Path, config: &CsvConfig) -> LoadResult<Vec<Row>> {
    let reader = reader_builder(config)?.from_path(path)?;

    let rows = read_records(reader)?;
    info!(path = %path.display(), rows = rows.len(), "read csv input");

    Ok(rows)
}

/// Reads every record from an already opened reader.
pub fn read_csv<R: io::Read>(input: R, config: &CsvConfig) -> LoadResult<Vec<Row>> {
    let reader = reader_builder(config)?.from_reader(input);

    read_records(reader)
}

fn reader_builder(config: &CsvConfig) -> LoadResult<csv::ReaderBuilder> {
    let delimiter = config.delimiter_byte().map_err(|err| {
        load_error!(
            ErrorKind::ConfigError,
            "Invalid CSV configuration",
            err.to_string()
        )
    })?;

    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(config.has_headers)
        .delimiter(delimiter)
        .flexible(true);

    Ok(builder)
}

fn read_records<R: io::Read>(mut reader: csv::Reader<R>) -> LoadResult<Vec<Row>> {
    reader
        .records()
        .map(|record| -> LoadResult<Row> { Ok(record?.iter().collect()) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_all_records_including_first_by_default() {
        let rows = read_csv("1,Ada\n2,Grace\n".as_bytes(), &CsvConfig::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(1), Some("Ada"));
    }

    #[test]
    fn skips_header_and_accepts_short_records() {
        let config = CsvConfig {
            has_headers: true,
            delimiter: ";".to_string(),
        };

        let rows = read_csv("id;name;email\n1;Ada\n2;Grace;g@x.io\n".as_bytes(), &config).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].get(2), Some("g@x.io"));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1,Ada").unwrap();

        let rows = read_csv_file(file.path(), &CsvConfig::default()).unwrap();

        assert_eq!(rows, vec![["1", "Ada"].into_iter().collect::<Row>()]);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = read_csv_file(Path::new("/no/such/file.csv"), &CsvConfig::default()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InputIoError);
    }
}
