//! On-disk JSON document store with size/age rollover.
//!
//! One document per store. Every operation - reads included - runs under a
//! single `tokio::sync::Mutex` held across the whole open/read/write/close
//! sequence, which keeps rollover atomic with respect to writers and rules
//! out torn documents. Writes are rare next to provider I/O, so the coarse
//! lock costs little.

use crate::config::JournalOptions;
use anyhow::Context;
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Derive a second store configuration pointing at a sibling document
/// (`responses.json` → `responses-attempts.json`), sharing every other
/// option with the original.
pub fn sibling_options(options: &JournalOptions, suffix: &str) -> JournalOptions {
    let mut derived = options.clone();
    let stem = options
        .file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = options
        .file_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    derived.file_path = options
        .file_path
        .with_file_name(format!("{stem}{suffix}{ext}"));
    derived
}

pub struct JsonFileStore {
    options: JournalOptions,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(options: JournalOptions) -> Self {
        Self {
            options,
            lock: Mutex::new(()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn file_path(&self) -> &std::path::Path {
        &self.options.file_path
    }

    /// Create an empty document (and parent directories) at startup.
    pub async fn ensure_file(&self) -> anyhow::Result<()> {
        if !self.options.enabled {
            return Ok(());
        }
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.options.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create journal directory {}", parent.display())
                })?;
            }
        }
        if fs::metadata(&self.options.file_path).await.is_err() {
            fs::write(&self.options.file_path, b"").await.with_context(|| {
                format!(
                    "Failed to create journal file {}",
                    self.options.file_path.display()
                )
            })?;
        }
        Ok(())
    }

    /// Load the current document. None when the store is disabled, the file
    /// is absent, or the file is empty.
    pub async fn load<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        if !self.options.enabled {
            return Ok(None);
        }
        let _guard = self.lock.lock().await;
        self.load_locked().await
    }

    /// Alias of `load`.
    pub async fn read<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        self.load().await
    }

    /// Replace the document. Runs the rollover check first; a triggered
    /// rollover completes before this write proceeds.
    pub async fn write<T: Serialize>(&self, document: &T) -> anyhow::Result<()> {
        if !self.options.enabled {
            return Ok(());
        }
        let _guard = self.lock.lock().await;

        if let Some(archived) = self.rollover_if_needed_locked().await? {
            tracing::info!(archive = %archived.display(), "Journal rolled over before write");
        }

        let payload = serde_json::to_string_pretty(document)?;
        self.write_atomic_locked(&payload).await
    }

    /// Check size/age and roll the document into the archive directory if
    /// either threshold is exceeded. Returns the archive path if it rolled.
    pub async fn rollover_if_needed(&self) -> anyhow::Result<Option<PathBuf>> {
        if !self.options.enabled {
            return Ok(None);
        }
        let _guard = self.lock.lock().await;
        self.rollover_if_needed_locked().await
    }

    /// Unconditionally archive the current document and recreate it empty.
    pub async fn force_rollover(&self) -> anyhow::Result<Option<PathBuf>> {
        if !self.options.enabled {
            return Ok(None);
        }
        let _guard = self.lock.lock().await;

        if fs::metadata(&self.options.file_path).await.is_err() {
            self.write_atomic_locked("").await?;
        }
        let archived = self.archive_locked().await?;
        Ok(Some(archived))
    }

    async fn load_locked<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        let raw = match fs::read_to_string(&self.options.file_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to read journal file {}",
                        self.options.file_path.display()
                    )
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let document = serde_json::from_str(&raw).with_context(|| {
            format!(
                "Malformed journal document {}",
                self.options.file_path.display()
            )
        })?;
        Ok(Some(document))
    }

    async fn rollover_if_needed_locked(&self) -> anyhow::Result<Option<PathBuf>> {
        let metadata = match fs::metadata(&self.options.file_path).await {
            Ok(metadata) => metadata,
            Err(_) => return Ok(None),
        };

        let over_size = metadata.len() > self.options.max_file_size_bytes;
        let over_age = {
            let max_age = Duration::from_secs(self.options.max_file_age_days * SECS_PER_DAY);
            let birth = metadata.created().or_else(|_| metadata.modified());
            match birth.and_then(|t| t.elapsed().map_err(|_| std::io::Error::other("clock skew")))
            {
                Ok(age) => age > max_age,
                Err(_) => false,
            }
        };

        if !over_size && !over_age {
            return Ok(None);
        }

        tracing::debug!(
            size = metadata.len(),
            over_size,
            over_age,
            "Journal document exceeds threshold, rolling over"
        );
        let archived = self.archive_locked().await?;
        Ok(Some(archived))
    }

    async fn archive_locked(&self) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.options.rollover_directory)
            .await
            .with_context(|| {
                format!(
                    "Failed to create rollover directory {}",
                    self.options.rollover_directory.display()
                )
            })?;

        let stem = self
            .options
            .file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "journal".into());
        let ext = self
            .options
            .file_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        // Local time on purpose: operators browsing the archive directory
        // expect familiar timestamps.
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut candidate = self
            .options
            .rollover_directory
            .join(format!("{stem}_{timestamp}{ext}"));

        // Same-second rollovers must not clobber earlier archives
        let mut counter = 1u32;
        while fs::metadata(&candidate).await.is_ok() {
            candidate = self
                .options
                .rollover_directory
                .join(format!("{stem}_{timestamp}_{counter}{ext}"));
            counter += 1;
        }

        fs::rename(&self.options.file_path, &candidate)
            .await
            .with_context(|| {
                format!(
                    "Failed to move journal {} into archive",
                    self.options.file_path.display()
                )
            })?;

        self.write_atomic_locked("").await?;
        Ok(candidate)
    }

    async fn write_atomic_locked(&self, payload: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.options.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create journal directory {}", parent.display())
                })?;
            }
        }

        let tmp = self.options.file_path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .await
            .with_context(|| format!("Failed to write temporary journal {}", tmp.display()))?;
        fs::rename(&tmp, &self.options.file_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to rename journal into place: {}",
                    self.options.file_path.display()
                )
            })?;
        Ok(())
    }
}
