use crate::{error::TableError, tables::TableStore};
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::debug;

const EXTENSION: &str = "csv";

/// One CSV file per table under a directory. Cells are stored verbatim so
/// pre-rendered values survive a copy unchanged.
#[derive(Debug, Clone)]
pub struct CsvTableStore {
    dir: PathBuf,
}

impl CsvTableStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TableError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXTENSION}"))
    }

    fn existing(&self, name: &str) -> Result<PathBuf, TableError> {
        let path = self.path_of(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(TableError::NotFound(name.to_string()))
        }
    }

    fn read_all(path: &Path) -> Result<Vec<Vec<String>>, TableError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut records = Vec::new();
        for record in reader.records() {
            let record: StringRecord = record?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok(records)
    }

    /// Writes `records` to a sibling temp file, then renames it over `path`.
    fn write_all(path: &Path, records: &[Vec<String>]) -> Result<(), TableError> {
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        {
            let mut writer = WriterBuilder::new().flexible(true).from_path(&tmp)?;
            for record in records {
                writer.write_record(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for CsvTableStore {
    async fn exists(&self, name: &str) -> Result<bool, TableError> {
        Ok(self.path_of(name).is_file())
    }

    async fn create(&self, name: &str, header: &[String]) -> Result<(), TableError> {
        let path = self.path_of(name);
        if path.exists() {
            return Err(TableError::AlreadyExists(name.to_string()));
        }
        Self::write_all(&path, &[header.to_vec()])?;
        debug!(table = name, columns = header.len(), "Created table");
        Ok(())
    }

    async fn header(&self, name: &str) -> Result<Vec<String>, TableError> {
        let path = self.existing(name)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut record = StringRecord::new();
        if reader.read_record(&mut record)? {
            Ok(record.iter().map(str::to_string).collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn append(&self, name: &str, rows: &[Vec<String>]) -> Result<(), TableError> {
        let path = self.existing(name)?;
        if rows.is_empty() {
            return Ok(());
        }

        let file: File = OpenOptions::new().append(true).open(path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    async fn rows(&self, name: &str) -> Result<Vec<Vec<String>>, TableError> {
        let path = self.existing(name)?;
        let mut records = Self::read_all(&path)?;
        if !records.is_empty() {
            records.remove(0);
        }
        Ok(records)
    }

    async fn row_count(&self, name: &str) -> Result<u64, TableError> {
        let path = self.existing(name)?;
        let total = Self::read_all(&path)?.len() as u64;
        Ok(total.saturating_sub(1))
    }

    async fn truncate(&self, name: &str, keep: u64) -> Result<(), TableError> {
        let path = self.existing(name)?;
        let mut records = Self::read_all(&path)?;
        let rows = records.len().saturating_sub(1) as u64;
        if keep > rows {
            return Err(TableError::Truncate {
                table: name.to_string(),
                rows,
                keep,
            });
        }
        if keep == rows {
            return Ok(());
        }

        records.truncate(keep as usize + 1);
        Self::write_all(&path, &records)?;
        debug!(table = name, from = rows, to = keep, "Truncated table");
        Ok(())
    }

    async fn replace(&self, source: &str, target: &str) -> Result<(), TableError> {
        let from = self.existing(source)?;
        fs::rename(from, self.path_of(target))?;
        Ok(())
    }

    async fn drop_table(&self, name: &str) -> Result<(), TableError> {
        match fs::remove_file(self.path_of(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, TableError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
