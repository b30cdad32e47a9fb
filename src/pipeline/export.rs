use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::{AppError, AppResult};
use crate::models::{FailureEntry, ReportFamily, ResultRecord, Sphere, TAG_COLUMNS};

// Neither operation mutates its input. A failed write removes whatever
// it created, so a group either has its final file or nothing.
#[derive(Debug, Clone)]
pub struct ExportWriter {
    output_dir: PathBuf,
    family: ReportFamily,
}

impl ExportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, family: ReportFamily) -> Self {
        Self {
            output_dir: output_dir.into(),
            family,
        }
    }

    #[tracing::instrument(
        name = "export write_group",
        skip(self, records),
        fields(export.rows, export.columns)
    )]
    pub fn write_group(&self, records: &[ResultRecord], group_name: &str) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| AppError::export(&self.output_dir, e))?;

        let file_name = format!("{group_name}_{}.csv", timestamp());
        let csv_path = self.output_dir.join(&file_name);
        let zip_path = csv_path.with_extension("zip");
        let partial_path = self.output_dir.join(format!(".{file_name}.zip.partial"));

        let columns = columns(records);
        let rows = match write_csv(&csv_path, &columns, records) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = fs::remove_file(&csv_path);
                return Err(AppError::export(&csv_path, e));
            }
        };

        let archived = archive(&csv_path, &file_name, &partial_path)
            .and_then(|()| fs::rename(&partial_path, &zip_path));
        if let Err(e) = archived {
            let _ = fs::remove_file(&partial_path);
            let _ = fs::remove_file(&csv_path);
            return Err(AppError::export(&zip_path, e));
        }

        if let Err(e) = fs::remove_file(&csv_path) {
            tracing::warn!(
                path = %csv_path.display(),
                error = %e,
                "Could not remove intermediate CSV"
            );
        }

        let span = tracing::Span::current();
        span.record("export.rows", rows);
        span.record("export.columns", columns.len());

        Ok(zip_path)
    }

    pub fn write_failure_log(
        &self,
        entries: &[FailureEntry],
        sphere: &Sphere,
        region: Option<&str>,
    ) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| AppError::export(&self.output_dir, e))?;

        let region_part = region.map(|r| format!("_{r}")).unwrap_or_default();
        let file_name = format!(
            "failures_{}_{}{}_{}.txt",
            self.family,
            sphere,
            region_part,
            timestamp()
        );
        let path = self.output_dir.join(&file_name);
        let tmp_path = self.output_dir.join(format!(".{file_name}.tmp"));

        let contents = entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        let written = fs::write(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(AppError::export(&path, e));
        }

        Ok(path)
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn columns(records: &[ResultRecord]) -> Vec<String> {
    let tags: HashSet<&str> = TAG_COLUMNS.into_iter().collect();
    let mut seen = HashSet::new();
    let mut columns = Vec::new();

    for row in records.iter().flat_map(|r| r.rows.iter()) {
        for name in row.keys() {
            if !tags.contains(name.as_str()) && seen.insert(name.as_str()) {
                columns.push(name.clone());
            }
        }
    }
    columns.extend(TAG_COLUMNS.iter().map(|c| c.to_string()));
    columns
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn write_csv(path: &Path, columns: &[String], records: &[ResultRecord]) -> io::Result<usize> {
    let file = BufWriter::new(File::create(path)?);
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(file);

    writer.write_record(columns)?;
    let mut rows = 0;
    for row in records.iter().flat_map(ResultRecord::tagged_rows) {
        writer.write_record(columns.iter().map(|c| cell(row.get(c))))?;
        rows += 1;
    }

    let mut inner = writer.into_inner().map_err(|e| e.into_error())?;
    inner.flush()?;
    inner.get_ref().sync_all()?;
    Ok(rows)
}

fn archive(csv_path: &Path, entry_name: &str, zip_path: &Path) -> io::Result<()> {
    let mut source = File::open(csv_path)?;
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(entry_name, options).map_err(io::Error::other)?;
    io::copy(&mut source, &mut zip)?;
    let file = zip.finish().map_err(io::Error::other)?;
    file.sync_all()
}
