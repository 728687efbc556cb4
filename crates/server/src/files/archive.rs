//! Streaming ZIP archives of files and folders in the shared directory.
//!
//! The archive is written to any [`Write`] sink as it is built; nothing but
//! the current copy buffer and the ZIP central directory records is held in
//! memory, whatever the size of the files involved.
//!
//! A batch never fails because of one bad entry. Every requested path and
//! every file found under a requested directory produces an
//! [`EntryOutcome`]: either it was added or it was skipped with a reason.
//! Only failures of the sink itself (typically the client going away) stop
//! the archive.

use std::cell::Cell;
use std::collections::HashSet;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{Datelike, Timelike};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::root::SharedRoot;
use super::transfer::DEFAULT_CHUNK_SIZE;

/// Files at least this large need ZIP64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// What happened to one candidate entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The file was written to the archive.
    Added {
        /// Entry name inside the archive.
        name: String,
        /// Bytes copied into the entry.
        size: u64,
    },
    /// The candidate was left out (or cut short) and the batch continued.
    Skipped {
        /// The path as requested, or relative to the share for walked files.
        path: String,
        /// Why it was skipped.
        reason: String,
    },
}

impl EntryOutcome {
    fn skipped(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Skipped {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Totals for one archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries written.
    pub added: usize,
    /// Candidates skipped.
    pub skipped: usize,
    /// Uncompressed bytes written.
    pub bytes: u64,
}

impl ArchiveSummary {
    fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Added { name, size } => {
                debug!(entry = %name, size, "Added archive entry");
                self.added += 1;
                self.bytes += size;
            }
            EntryOutcome::Skipped { path, reason } => {
                warn!(path = %path, reason = %reason, "Skipped archive entry");
                self.skipped += 1;
            }
        }
    }
}

/// Builds ZIP archives from client-requested paths.
#[derive(Debug, Clone)]
pub struct ArchiveStreamer {
    root: Arc<SharedRoot>,
}

impl ArchiveStreamer {
    /// Create a streamer over the given shared root.
    pub fn new(root: Arc<SharedRoot>) -> Self {
        Self { root }
    }

    /// File name offered to clients for a batch download.
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.root.name())
    }

    /// Write an archive of `paths` to `writer`.
    ///
    /// Files become one entry each; directories are walked and every regular
    /// file beneath them is added. Entry names start with the shared
    /// directory's own name. Returns an error only when `writer` fails.
    pub fn write_archive<W: Write>(
        &self,
        paths: &[String],
        writer: W,
    ) -> io::Result<ArchiveSummary> {
        self.write_archive_observed(paths, writer, |_| {})
    }

    /// Like [`write_archive`](Self::write_archive), reporting every outcome.
    pub fn write_archive_observed<W, F>(
        &self,
        paths: &[String],
        mut writer: W,
        observe: F,
    ) -> io::Result<ArchiveSummary>
    where
        W: Write,
        F: FnMut(&EntryOutcome),
    {
        let failure = Cell::new(None);
        let summary = {
            let sink = FusedSink::new(&mut writer, &failure);
            let mut builder =
                ArchiveBuilder::new(&self.root, ZipWriter::new_stream(sink), observe);
            for requested in paths {
                builder.add_requested(requested)?;
            }
            builder.finish()?
        };
        if let Some(kind) = failure.get() {
            return Err(io::Error::new(kind, "archive sink failed"));
        }
        writer.flush()?;

        info!(
            requested = paths.len(),
            added = summary.added,
            skipped = summary.skipped,
            bytes = summary.bytes,
            "Archive complete"
        );
        Ok(summary)
    }
}

/// Sink wrapper that goes quiet after the first failed write.
///
/// An unfinished `ZipWriter` tries to write its central directory when it
/// is dropped. After the client has gone away those writes are discarded
/// here instead of failing again; the first failure is kept in `failure`.
struct FusedSink<'a, W> {
    inner: W,
    failure: &'a Cell<Option<io::ErrorKind>>,
}

impl<'a, W: Write> FusedSink<'a, W> {
    fn new(inner: W, failure: &'a Cell<Option<io::ErrorKind>>) -> Self {
        Self { inner, failure }
    }
}

impl<W: Write> Write for FusedSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failure.get().is_some() {
            return Ok(buf.len());
        }
        match self.inner.write(buf) {
            Err(err) if err.kind() != io::ErrorKind::Interrupted => {
                self.failure.set(Some(err.kind()));
                Err(err)
            }
            result => result,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.failure.get().is_some() {
            return Ok(());
        }
        self.inner.flush().inspect_err(|err| self.failure.set(Some(err.kind())))
    }
}

/// State of one archive being written.
struct ArchiveBuilder<'a, Z: Write + Seek, F> {
    root: &'a SharedRoot,
    zip: ZipWriter<Z>,
    /// Entry names already written; duplicates are skipped.
    seen: HashSet<String>,
    summary: ArchiveSummary,
    buffer: Vec<u8>,
    observe: F,
}

impl<'a, Z, F> ArchiveBuilder<'a, Z, F>
where
    Z: Write + Seek,
    F: FnMut(&EntryOutcome),
{
    fn new(root: &'a SharedRoot, zip: ZipWriter<Z>, observe: F) -> Self {
        Self {
            root,
            zip,
            seen: HashSet::new(),
            summary: ArchiveSummary::default(),
            buffer: vec![0u8; DEFAULT_CHUNK_SIZE],
            observe,
        }
    }

    fn record(&mut self, outcome: EntryOutcome) {
        self.summary.record(&outcome);
        (self.observe)(&outcome);
    }

    fn finish(self) -> io::Result<ArchiveSummary> {
        self.zip.finish().map_err(zip_to_io)?;
        Ok(self.summary)
    }

    /// Add one client-requested path, file or directory.
    fn add_requested(&mut self, requested: &str) -> io::Result<()> {
        let resolved = match self.root.resolve(requested) {
            Ok(path) => path,
            Err(err) => {
                self.record(EntryOutcome::skipped(requested, err.to_string()));
                return Ok(());
            }
        };

        let metadata = match fs::metadata(resolved.as_path()) {
            Ok(m) => m,
            Err(err) => {
                self.record(EntryOutcome::skipped(requested, err.to_string()));
                return Ok(());
            }
        };

        if metadata.is_dir() {
            self.add_directory(resolved.as_path())
        } else if metadata.is_file() {
            let outcome = self.add_file(resolved.as_path())?;
            self.record(outcome);
            Ok(())
        } else {
            self.record(EntryOutcome::skipped(requested, "not a regular file"));
            Ok(())
        }
    }

    /// Walk a directory and add every regular file beneath it.
    ///
    /// The walk is iterative. Directory symlinks are not followed; file
    /// symlinks are added only when their target is inside the share.
    fn add_directory(&mut self, dir: &Path) -> io::Result<()> {
        let walker = WalkDir::new(dir).follow_links(false).sort_by_file_name();

        for item in walker {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| self.label(p))
                        .unwrap_or_else(|| self.label(dir));
                    self.record(EntryOutcome::skipped(path, err.to_string()));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }

            if file_type.is_symlink() {
                match fs::canonicalize(entry.path()) {
                    Ok(target) if !self.root.contains(&target) => {
                        let label = self.label(entry.path());
                        self.record(EntryOutcome::skipped(
                            label,
                            "symlink points outside the shared directory",
                        ));
                        continue;
                    }
                    Ok(target) if target.is_dir() => {
                        let label = self.label(entry.path());
                        self.record(EntryOutcome::skipped(
                            label,
                            "symlinked directories are not followed",
                        ));
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let label = self.label(entry.path());
                        self.record(EntryOutcome::skipped(label, err.to_string()));
                        continue;
                    }
                }
            } else if !file_type.is_file() {
                let label = self.label(entry.path());
                self.record(EntryOutcome::skipped(label, "not a regular file"));
                continue;
            }

            let outcome = self.add_file(entry.path())?;
            self.record(outcome);
        }

        Ok(())
    }

    /// Add a single file. `Err` means the sink failed.
    ///
    /// The file is opened before its entry header is written, so files that
    /// vanished or cannot be opened are skipped cleanly. A read error after
    /// the header is out ends the entry early; streamed output cannot be
    /// taken back, so the outcome is a skip with the truncation noted.
    fn add_file(&mut self, path: &Path) -> io::Result<EntryOutcome> {
        let label = self.label(path);

        let Some(name) = self.root.archive_entry_name(path) else {
            return Ok(EntryOutcome::skipped(label, "outside the shared directory"));
        };
        if self.seen.contains(&name) {
            return Ok(EntryOutcome::skipped(label, "already in the archive"));
        }

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(err) => return Ok(EntryOutcome::skipped(label, err.to_string())),
        };
        let metadata = match file.metadata() {
            Ok(m) => m,
            Err(err) => return Ok(EntryOutcome::skipped(label, err.to_string())),
        };
        if !metadata.is_file() {
            return Ok(EntryOutcome::skipped(label, "not a regular file"));
        }

        self.zip
            .start_file(name.as_str(), entry_options(&metadata))
            .map_err(zip_to_io)?;
        self.seen.insert(name.clone());

        let mut written = 0u64;
        loop {
            let n = match file.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Ok(EntryOutcome::skipped(
                        label,
                        format!("read failed after {written} bytes, entry truncated: {err}"),
                    ));
                }
            };
            self.zip.write_all(&self.buffer[..n])?;
            written += n as u64;
        }

        Ok(EntryOutcome::Added {
            name,
            size: written,
        })
    }

    /// Share-relative label for log lines and outcomes.
    fn label(&self, path: &Path) -> String {
        self.root
            .relative_wire_path(path)
            .unwrap_or_else(|| path.display().to_string())
    }
}

/// Deflate at the default level, stamped with the file's local mtime.
fn entry_options(metadata: &Metadata) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(metadata.len() >= ZIP64_THRESHOLD);

    if let Ok(modified) = metadata.modified() {
        options = options.last_modified_time(zip_timestamp(modified));
    }
    options
}

/// Convert to a DOS timestamp; out-of-range times fall back to 1980-01-01.
fn zip_timestamp(time: SystemTime) -> zip::DateTime {
    let local: chrono::DateTime<chrono::Local> = time.into();
    u16::try_from(local.year())
        .ok()
        .and_then(|year| {
            zip::DateTime::from_date_and_time(
                year,
                local.month() as u8,
                local.day() as u8,
                local.hour() as u8,
                local.minute() as u8,
                local.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}

fn zip_to_io(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(err) => err,
        other => io::Error::other(other),
    }
}
