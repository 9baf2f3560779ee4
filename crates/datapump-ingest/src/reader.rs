//! File ingestion: byte source + config -> in-memory table
//!
//! Handles plain, gzip-compressed, and single-entry zip sources, local or
//! remote, and stitches configured column names onto headerless data.
//! Parse-level faults come back as error values so the caller can record
//! them on the file's lifecycle record and move on.

use crate::remote::{path_scheme, ObjectStore, RemoteFile, RemoteLocation};
use datapump_common::{ConfigRecord, PumpError, Result, Table};
use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader, Cursor, Read, Seek};
use tracing::debug;

/// Read the file at `path` into a [`Table`] according to `config`.
///
/// Remote paths (`s3://bucket/key`) go through `store`; anything without a
/// scheme is opened from the local filesystem.
pub fn read_file(store: &dyn ObjectStore, config: &ConfigRecord, path: &str) -> Result<Table> {
    let source = open_source(store, config, path)?;
    let table = parse_delimited(source, config)?;
    debug!(
        rows = table.row_count(),
        columns = table.columns().len(),
        path,
        "parsed file"
    );
    Ok(table)
}

/// Open `path` as a sequential byte stream, decompressing if configured.
fn open_source(
    store: &dyn ObjectStore,
    config: &ConfigRecord,
    path: &str,
) -> Result<Box<dyn Read + Send>> {
    match path_scheme(path) {
        Some("s3") => {
            let location = RemoteLocation::parse(path)?;
            if !config.is_file_zipped {
                store.get_reader(&location.bucket, &location.key)
            } else if location.key.ends_with(".gz") {
                let body = store.get_reader(&location.bucket, &location.key)?;
                Ok(Box::new(GzDecoder::new(body)))
            } else if location.key.ends_with(".zip") {
                let file = RemoteFile::new(store, location);
                Ok(Box::new(Cursor::new(extract_single_entry(file)?)))
            } else {
                Err(PumpError::UnsupportedFormat(format!(
                    "compressed file '{path}' is neither .gz nor .zip"
                )))
            }
        },
        Some(scheme) => Err(PumpError::UnsupportedFormat(format!(
            "unsupported path scheme '{scheme}'"
        ))),
        None => {
            let file = std::fs::File::open(path)?;
            if !config.is_file_zipped {
                Ok(Box::new(file))
            } else if path.ends_with(".gz") {
                Ok(Box::new(GzDecoder::new(file)))
            } else if path.ends_with(".zip") {
                Ok(Box::new(Cursor::new(extract_single_entry(file)?)))
            } else {
                Err(PumpError::UnsupportedFormat(format!(
                    "compressed file '{path}' is neither .gz nor .zip"
                )))
            }
        },
    }
}

/// Extract the single data-bearing entry of a zip archive.
///
/// Zero or multiple file entries is an explicit error rather than
/// whichever entry happens to read last.
fn extract_single_entry<R: Read + Seek>(reader: R) -> Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| PumpError::Parse(format!("unreadable zip archive: {e}")))?;

    let mut file_indices = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| PumpError::Parse(format!("unreadable zip entry {i}: {e}")))?;
        if !entry.is_dir() {
            file_indices.push(i);
        }
    }

    let index = match file_indices.as_slice() {
        [] => {
            return Err(PumpError::Parse(
                "zip archive contains no file entries".to_string(),
            ))
        },
        [index] => *index,
        many => {
            return Err(PumpError::Parse(format!(
                "zip archive contains {} file entries, expected exactly one",
                many.len()
            )))
        },
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| PumpError::Parse(format!("unreadable zip entry {index}: {e}")))?;
    let mut contents = Vec::new();
    entry
        .read_to_end(&mut contents)
        .map_err(|e| PumpError::Parse(format!("failed to extract '{}': {e}", entry.name())))?;
    debug!(entry = entry.name(), bytes = contents.len(), "extracted zip entry");
    Ok(contents)
}

/// Parse delimited text into rows, applying the header rules.
///
/// With a header, the first parsed row becomes the column sequence. Without
/// one, the configured column names must match the parsed width exactly or
/// the whole read fails with both counts.
fn parse_delimited(source: impl Read, config: &ConfigRecord) -> Result<Table> {
    let (mut columns, rows) = match config.source_data_format.delimiter() {
        Some(delimiter) => parse_with_delimiter(source, delimiter, config.header_exist)?,
        None => parse_whitespace(source, config.header_exist)?,
    };

    if !config.header_exist {
        let configured = config.configured_columns();
        let found = rows.first().map_or(configured.len(), Vec::len);
        if configured.len() != found {
            return Err(PumpError::SchemaMismatch {
                configured: configured.len(),
                found,
                columns: config.column_names.clone(),
            });
        }
        columns = configured;
    }

    Ok(Table::new(columns, rows))
}

#[allow(clippy::type_complexity)]
fn parse_with_delimiter(
    source: impl Read,
    delimiter: u8,
    header_exist: bool,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(header_exist)
        .from_reader(source);

    let columns = if header_exist {
        reader
            .headers()
            .map_err(|e| PumpError::Parse(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PumpError::Parse(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((columns, rows))
}

/// Whitespace-run splitting for the `space` format; blank lines are skipped.
#[allow(clippy::type_complexity)]
fn parse_whitespace(
    source: impl Read,
    header_exist: bool,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let reader = BufReader::new(source);
    let mut columns = Vec::new();
    let mut rows = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|e| PumpError::Parse(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if header_exist && columns.is_empty() {
            columns = fields;
        } else {
            rows.push(fields);
        }
    }

    if let Some(first) = rows.first() {
        let width = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(PumpError::Parse(format!(
                "ragged whitespace-delimited data: expected {width} fields, found {}",
                bad.len()
            )));
        }
    }
    Ok((columns, rows))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::tests::FakeStore;
    use datapump_common::{RecordEncoding, SourceFormat};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn config(format: SourceFormat, header_exist: bool, column_names: &str) -> ConfigRecord {
        ConfigRecord {
            source_data_format: format,
            header_exist,
            column_names: column_names.to_string(),
            is_file_zipped: false,
            dest_stream: "s1".to_string(),
            encoding: RecordEncoding::default(),
        }
    }

    fn local_file(contents: &[u8], suffix: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("data{suffix}"));
        std::fs::write(&path, contents).unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    // FakeStore counts fetches but read_file only needs the trait surface.
    fn store(key: &str, data: Vec<u8>) -> FakeStore {
        FakeStore::new("bucket", key, data)
    }

    #[test]
    fn test_pipe_with_header() {
        let (_dir, path) = local_file(b"a|b|c\n1|2|3\n4|5|6\n", ".psv");
        let store = store("unused", vec![]);
        let table = read_file(&store, &config(SourceFormat::Pipe, true, ""), &path).unwrap();
        assert_eq!(table.columns(), ["a", "b", "c"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[1], vec!["4", "5", "6"]);
    }

    #[test]
    fn test_comma_headerless_with_configured_columns() {
        let (_dir, path) = local_file(b"1,2\n3,4\n", ".csv");
        let store = store("unused", vec![]);
        let table =
            read_file(&store, &config(SourceFormat::Comma, false, "x, y"), &path).unwrap();
        assert_eq!(table.columns(), ["x", "y"]);
        assert_eq!(table.rows()[0], vec!["1", "2"]);
    }

    #[test]
    fn test_schema_mismatch_reports_both_counts() {
        let (_dir, path) = local_file(b"1,2,3\n4,5,6\n", ".csv");
        let store = store("unused", vec![]);
        let err =
            read_file(&store, &config(SourceFormat::Comma, false, "a,b"), &path).unwrap_err();
        match err {
            PumpError::SchemaMismatch {
                configured, found, ..
            } => {
                assert_eq!(configured, 2);
                assert_eq!(found, 3);
            },
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_whitespace_runs_split_as_one_delimiter() {
        let (_dir, path) = local_file(b"a b   c\n1  2 3\n\n", ".txt");
        let store = store("unused", vec![]);
        let table = read_file(&store, &config(SourceFormat::Space, true, ""), &path).unwrap();
        assert_eq!(table.columns(), ["a", "b", "c"]);
        assert_eq!(table.rows(), [vec!["1", "2", "3"]]);
    }

    #[test]
    fn test_remote_plain_object() {
        let store = store("landing/data.tsv", b"a\tb\n1\t2\n".to_vec());
        let table = read_file(
            &store,
            &config(SourceFormat::Tab, true, ""),
            "s3://bucket/landing/data.tsv",
        )
        .unwrap();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.rows(), [vec!["1", "2"]]);
    }

    #[test]
    fn test_gzip_parses_like_plain() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"a,b\n1,2\n3,4\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let store = store("landing/data.csv.gz", compressed);
        let mut cfg = config(SourceFormat::Comma, true, "");
        cfg.is_file_zipped = true;
        let table = read_file(&store, &cfg, "s3://bucket/landing/data.csv.gz").unwrap();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_zip_single_entry_via_range_reads() {
        let archive = zip_archive(&[("data.tsv", b"a\tb\n1\t2\n")]);
        let store = store("landing/data.tsv.zip", archive);
        let mut cfg = config(SourceFormat::Tab, true, "");
        cfg.is_file_zipped = true;
        let table = read_file(&store, &cfg, "s3://bucket/landing/data.tsv.zip").unwrap();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.rows(), [vec!["1", "2"]]);
        // The archive must have been walked with ranged fetches, not one
        // whole-object download per read.
        assert!(store.fetches.load(std::sync::atomic::Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_zip_with_multiple_entries_is_rejected() {
        let archive = zip_archive(&[("one.tsv", b"a\n"), ("two.tsv", b"b\n")]);
        let store = store("landing/data.zip", archive);
        let mut cfg = config(SourceFormat::Tab, true, "");
        cfg.is_file_zipped = true;
        let err = read_file(&store, &cfg, "s3://bucket/landing/data.zip").unwrap_err();
        assert!(err.to_string().contains("2 file entries"));
    }

    #[test]
    fn test_empty_zip_is_rejected() {
        let archive = zip_archive(&[]);
        let store = store("landing/data.zip", archive);
        let mut cfg = config(SourceFormat::Comma, true, "");
        cfg.is_file_zipped = true;
        let err = read_file(&store, &cfg, "s3://bucket/landing/data.zip").unwrap_err();
        assert!(err.to_string().contains("no file entries"));
    }

    #[test]
    fn test_unknown_compressed_suffix_is_rejected() {
        let store = store("landing/data.bz2", vec![1, 2, 3]);
        let mut cfg = config(SourceFormat::Comma, true, "");
        cfg.is_file_zipped = true;
        assert!(matches!(
            read_file(&store, &cfg, "s3://bucket/landing/data.bz2"),
            Err(PumpError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let store = store("unused", vec![]);
        assert!(matches!(
            read_file(
                &store,
                &config(SourceFormat::Comma, true, ""),
                "ftp://host/file.csv"
            ),
            Err(PumpError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_malformed_gzip_is_a_parse_failure() {
        let store = store("landing/data.csv.gz", b"not gzip".to_vec());
        let mut cfg = config(SourceFormat::Comma, true, "");
        cfg.is_file_zipped = true;
        let err = read_file(&store, &cfg, "s3://bucket/landing/data.csv.gz").unwrap_err();
        assert!(matches!(err, PumpError::Parse(_)));
    }
}
