use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::backend::ChurnBackend;
use crate::error::ConsoleResult;
use crate::models::{ExportFormat, ExportPayload, RiskTier};
use crate::notice::Notice;
use crate::pipeline::SingleFlight;

pub const EXPORT_STEM: &str = "customers_export";

/// `customers_export[_<tier>_risk].<ext>`
pub fn export_filename(format: ExportFormat, risk_level: Option<RiskTier>) -> String {
    let mut name = String::from(EXPORT_STEM);
    if let Some(tier) = risk_level {
        name.push('_');
        name.push_str(&tier.as_str().to_lowercase());
        name.push_str("_risk");
    }
    name.push('.');
    name.push_str(format.extension());
    name
}

/// Host mechanism that receives downloaded files.
pub trait FileSink {
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl FileSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Saved { path: PathBuf, rows: usize },
    Records(Vec<serde_json::Value>),
}

/// Counts data rows of a CSV payload, skipping the header and any record
/// that fails to parse.
pub fn count_csv_rows(bytes: &[u8]) -> usize {
    csv::Reader::from_reader(bytes)
        .records()
        .filter(|record| record.is_ok())
        .count()
}

/// Issues exports. Has its own loading/error state and never touches the
/// customer listing.
pub struct ExportTrigger<S: FileSink> {
    sink: S,
    flight: SingleFlight<ExportOutcome>,
}

impl<S: FileSink> ExportTrigger<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            flight: SingleFlight::new("export", "export data"),
        }
    }

    pub async fn export_customers(
        &self,
        backend: &dyn ChurnBackend,
        format: ExportFormat,
        risk_level: Option<RiskTier>,
    ) -> ConsoleResult<ExportOutcome> {
        self.flight
            .execute(|| self.run(backend, format, risk_level))
            .await
    }

    async fn run(
        &self,
        backend: &dyn ChurnBackend,
        format: ExportFormat,
        risk_level: Option<RiskTier>,
    ) -> ConsoleResult<ExportOutcome> {
        match backend.export_customers(format, risk_level).await? {
            ExportPayload::Csv(bytes) => {
                let filename = export_filename(format, risk_level);
                let rows = count_csv_rows(&bytes);
                let path = self.sink.save(&filename, &bytes)?;
                info!(path = %path.display(), rows, "export saved");
                Ok(ExportOutcome::Saved { path, rows })
            }
            ExportPayload::Json(records) => Ok(ExportOutcome::Records(records)),
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        match self.flight.success() {
            Some(_) => Some(Notice::success("Export completed successfully")),
            None => self.flight.failure(),
        }
    }
}
