//! Output sinks for captured pages

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::ImageFormat;
use scanlink_types::Page;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Destination for the pages of one session
///
/// Pages are appended as they are captured. A sink that is neither
/// committed nor discarded must release its partial output when dropped.
pub trait OutputSink: Send {
    /// Persist the next page
    fn append(&mut self, page: &Page) -> Result<()>;

    /// Pages persisted so far
    fn page_count(&self) -> usize;

    /// Bytes persisted so far
    fn bytes_written(&self) -> u64;

    /// Keep the output
    fn commit(&mut self) -> Result<()>;

    /// Delete everything written so far
    fn discard(&mut self) -> Result<()>;
}

/// Suffixes tried before giving up on a directory name
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Open,
    Committed,
    Discarded,
}

/// Writes each page as a PNG file into a per-session directory
///
/// ```text
/// scans/
/// └── 20261019-142501-250-3/
///     ├── page-0001.png
///     └── page-0002.png
/// ```
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    pages: usize,
    bytes_written: u64,
    state: SinkState,
}

impl DirectorySink {
    /// Create the session directory under `parent`
    pub fn create(parent: impl AsRef<Path>, session_id: u64) -> Result<Self> {
        let parent = parent.as_ref();
        fs::create_dir_all(parent)?;

        let base = format!("{}-{}", Local::now().format("%Y%m%d-%H%M%S-%3f"), session_id);
        let dir = create_unique_dir(parent, &base)?;

        debug!("Writing session {} to {}", session_id, dir.display());

        Ok(Self {
            dir,
            pages: 0,
            bytes_written: 0,
            state: SinkState::Open,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            SinkState::Open => Ok(()),
            _ => Err(Error::OutputFinalized),
        }
    }

    fn remove(&mut self) -> Result<()> {
        self.state = SinkState::Discarded;
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Create `parent/base`, or `parent/base-N` if that is taken
///
/// Session ids restart with the server, so a quick restart can reuse a name.
fn create_unique_dir(parent: &Path, base: &str) -> Result<PathBuf> {
    let mut dir = parent.join(base);

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                dir = parent.join(format!("{}-{}", base, attempt));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free directory name for {} under {}", base, parent.display()),
    )
    .into())
}

impl OutputSink for DirectorySink {
    fn append(&mut self, page: &Page) -> Result<()> {
        self.ensure_open()?;

        let path = self.dir.join(format!("page-{:04}.png", self.pages + 1));
        page.image().save_with_format(&path, ImageFormat::Png)?;

        self.bytes_written += fs::metadata(&path)?.len();
        self.pages += 1;

        debug!("Saved {}", path.display());
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = SinkState::Committed;

        info!(
            "Kept {} pages ({} bytes) in {}",
            self.pages,
            self.bytes_written,
            self.dir.display()
        );
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.ensure_open()?;
        debug!("Discarding {}", self.dir.display());
        self.remove()
    }
}

impl Drop for DirectorySink {
    fn drop(&mut self) {
        if self.state == SinkState::Open {
            if let Err(e) = self.remove() {
                warn!("Failed to remove partial output {}: {}", self.dir.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use pretty_assertions::assert_eq;

    fn page() -> Page {
        Page::new(RgbImage::from_pixel(32, 48, image::Rgb([200, 10, 10])))
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_append_and_commit() {
        let root = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(root.path(), 1).unwrap();

        sink.append(&page()).unwrap();
        sink.append(&page()).unwrap();
        assert_eq!(sink.page_count(), 2);
        assert!(sink.bytes_written() > 0);

        sink.commit().unwrap();
        let dir = sink.path().to_path_buf();
        drop(sink);

        assert_eq!(entries(&dir), 2);
        assert!(dir.join("page-0001.png").exists());
        assert!(dir.join("page-0002.png").exists());
    }

    #[test]
    fn test_discard_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(root.path(), 2).unwrap();
        sink.append(&page()).unwrap();

        sink.discard().unwrap();
        assert!(!sink.path().exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_drop_without_commit_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        {
            let mut sink = DirectorySink::create(root.path(), 3).unwrap();
            sink.append(&page()).unwrap();
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_same_session_id_gets_distinct_directories() {
        let root = tempfile::tempdir().unwrap();

        // A restarted server hands out the same ids again
        let mut first = DirectorySink::create(root.path(), 1).unwrap();
        let mut second = DirectorySink::create(root.path(), 1).unwrap();
        assert_ne!(first.path(), second.path());

        first.commit().unwrap();
        second.commit().unwrap();
        assert_eq!(entries(root.path()), 2);
    }

    #[test]
    fn test_taken_name_gets_suffix() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("session")).unwrap();

        let dir = create_unique_dir(root.path(), "session").unwrap();
        assert_eq!(dir, root.path().join("session-1"));
    }

    #[test]
    fn test_finalized_sink_rejects_pages() {
        let root = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(root.path(), 4).unwrap();
        sink.commit().unwrap();

        assert!(matches!(sink.append(&page()), Err(Error::OutputFinalized)));
        assert!(matches!(sink.discard(), Err(Error::OutputFinalized)));
    }
}
