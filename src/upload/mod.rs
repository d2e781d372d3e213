//! Delivery of finalized ride files to the remote document store.
//!
//! One pass over the pending directory, one file at a time. A file only
//! leaves the pending directory after the store has confirmed the write, so
//! delivery is at-least-once.

pub mod document;
pub mod firestore;
pub mod parse;

pub use document::{Document, Field};
pub use firestore::FirestoreSink;

use crate::config::TrackerConfig;
use crate::error::{ParseError, TResult, TransportError};
use crate::ride_log::{ride_index_from_name, sanitize_file};
use crate::samples::{now_local, TIME_FORMAT};
use log::{error, info, warn};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote document store
pub trait RemoteSink {
    fn upsert(
        &self,
        collection: &str,
        document: &Document,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Artifact kind, decided by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideFileKind {
    Gps,
    Imu,
}

impl RideFileKind {
    pub fn from_name(name: &str) -> Self {
        if name.contains("_imu") {
            RideFileKind::Imu
        } else {
            RideFileKind::Gps
        }
    }
}

/// Outcome of one upload pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    /// Files left pending because they could not be read or parsed
    pub skipped: Vec<String>,
    /// Confirmed uploads that could not be moved out of the pending directory
    pub unmoved: Vec<String>,
}

pub struct UploadCoordinator<S: RemoteSink> {
    sink: S,
    pending: PathBuf,
    sent: PathBuf,
    device_id: String,
    gps_collection: String,
    imu_collection: String,
    backoff: Duration,
}

impl<S: RemoteSink> UploadCoordinator<S> {
    pub fn new(sink: S, pending: &Path, sent: &Path, config: &TrackerConfig) -> Self {
        UploadCoordinator {
            sink,
            pending: pending.to_path_buf(),
            sent: sent.to_path_buf(),
            device_id: config.device_id.clone(),
            gps_collection: config.gps_collection.clone(),
            imu_collection: config.imu_collection.clone(),
            backoff: config.upload_backoff(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Snapshot the pending directory, sorted by name, skipping dotfiles
    fn pending_files(&self) -> TResult<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.pending)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            files.push((name, entry.path()));
        }
        files.sort();
        Ok(files)
    }

    /// Sanitize and parse one pending file into its upload document
    fn prepare(&self, name: &str, path: &Path, kind: RideFileKind) -> TResult<Document> {
        let text = sanitize_file(path)?;
        let index = ride_index_from_name(name).ok_or_else(|| ParseError::NoRideIndex(name.to_string()))?;
        let mut doc = match kind {
            RideFileKind::Gps => parse::parse_gps(&text)?,
            RideFileKind::Imu => parse::parse_imu(&text)?,
        };
        doc.insert("dev_id".into(), Field::from(self.device_id.as_str()));
        doc.insert("index".into(), Field::from(index));
        Ok(doc)
    }

    /// Retry the same write until the store accepts it
    async fn deliver(&self, name: &str, collection: &str, doc: &Document) -> u32 {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.sink.upsert(collection, doc).await {
                Ok(()) => return attempts,
                Err(e) => {
                    error!(
                        "{} upload of {} to {} failed (attempt {}): {}, retrying in {:.0}s",
                        now_local().format(TIME_FORMAT),
                        name,
                        collection,
                        attempts,
                        e,
                        self.backoff.as_secs_f64()
                    );
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    /// One pass over the files pending at call time. Only returns once every
    /// parseable file has been delivered.
    pub async fn run(&self) -> TResult<UploadReport> {
        let files = self.pending_files()?;
        info!("{} ride file(s) pending upload", files.len());
        let mut report = UploadReport::default();

        for (name, path) in files {
            let kind = RideFileKind::from_name(&name);
            let doc = match self.prepare(&name, &path, kind) {
                Ok(doc) => doc,
                Err(e) => {
                    match kind {
                        RideFileKind::Imu => warn!("skipping malformed IMU file {}: {}", name, e),
                        RideFileKind::Gps => error!(
                            "{} unable to send {} to database, GPS log unreadable: {}",
                            now_local().format(TIME_FORMAT),
                            name,
                            e
                        ),
                    }
                    report.skipped.push(name);
                    continue;
                }
            };

            let collection = match kind {
                RideFileKind::Gps => &self.gps_collection,
                RideFileKind::Imu => &self.imu_collection,
            };
            let attempts = self.deliver(&name, collection, &doc).await;
            info!("uploaded {} to {} after {} attempt(s)", name, collection, attempts);

            // The remote write stands even if the file cannot be moved
            if let Err(e) = fs::rename(&path, self.sent.join(&name)) {
                error!("uploaded {} but could not move it to {}: {}", name, self.sent.display(), e);
                report.unmoved.push(name.clone());
            }
            report.uploaded.push(name);
        }

        info!(
            "upload pass done: {} uploaded, {} left pending",
            report.uploaded.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
