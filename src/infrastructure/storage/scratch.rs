use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

const JOB_PREFIX: &str = "job-";
const TRASH_PREFIX: &str = ".trash-";

type LiveJobs = Arc<Mutex<HashSet<Uuid>>>;

/// Root directory under which every request gets its own job directory.
#[derive(Clone, Debug)]
pub struct ScratchSpace {
    root: PathBuf,
    live: LiveJobs,
}

impl ScratchSpace {
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            live: Arc::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh `job-<uuid>` directory. `create_dir` fails on an existing
    /// path, so two live jobs never share one.
    pub async fn create_job(&self) -> io::Result<ScratchJob> {
        let id = Uuid::new_v4();
        let dir = self.root.join(format!("{JOB_PREFIX}{id}"));
        tokio::fs::create_dir(&dir).await?;
        self.live.lock().insert(id);
        debug!("Created scratch job {}", dir.display());
        Ok(ScratchJob {
            id,
            dir,
            root: self.root.clone(),
            live: Arc::clone(&self.live),
        })
    }

    /// Number of jobs whose `ScratchJob` handle is still alive.
    pub fn live_jobs(&self) -> usize {
        self.live.lock().len()
    }

    /// Removes every job directory, regardless of age. Only runs at startup,
    /// before any request could own one. Only `job-*` entries (and trash left
    /// by an interrupted cleanup) are touched so a misconfigured root does not
    /// lose foreign files.
    pub async fn purge(&self) -> io::Result<usize> {
        self.remove_jobs(|_| true).await
    }

    /// Removes job directories last modified more than `max_age` ago. Jobs
    /// still held by a request are skipped: serving a file to a slow client
    /// does not touch the directory mtime.
    pub async fn sweep_older_than(&self, max_age: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let live = self.live.lock().clone();
        self.remove_jobs(|entry| {
            if entry.id.is_some_and(|id| live.contains(&id)) {
                return false;
            }
            entry
                .modified
                .and_then(|m| now.duration_since(m).ok())
                .is_some_and(|age| age > max_age)
        })
        .await
    }

    async fn remove_jobs<F>(&self, should_remove: F) -> io::Result<usize>
    where
        F: Fn(&JobEntry) -> bool,
    {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let trash = name.starts_with(TRASH_PREFIX);
            if !trash && !name.starts_with(JOB_PREFIX) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_dir() {
                continue;
            }
            let job = JobEntry {
                id: name
                    .strip_prefix(JOB_PREFIX)
                    .and_then(|raw| Uuid::parse_str(raw).ok()),
                modified: meta.modified().ok(),
            };
            // Trash is always garbage; it only exists when a drop-time removal
            // did not finish.
            if !trash && !should_remove(&job) {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) if trash => {}
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }
        if removed > 0 {
            info!("Removed {} scratch job(s) from {}", removed, self.root.display());
        }
        Ok(removed)
    }
}

struct JobEntry {
    id: Option<Uuid>,
    modified: Option<SystemTime>,
}

/// One request's private directory. Deleted with everything in it on drop.
#[derive(Debug)]
pub struct ScratchJob {
    id: Uuid,
    dir: PathBuf,
    root: PathBuf,
    live: LiveJobs,
}

impl ScratchJob {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// First regular file whose name starts with `stem.`.
    pub async fn find_file(&self, stem: &str) -> io::Result<Option<PathBuf>> {
        let prefix = format!("{stem}.");
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut found: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || name.ends_with(".part") || name.ends_with(".ytdl") {
                continue;
            }
            if entry.file_type().await?.is_file() {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found.into_iter().next())
    }
}

/// The job directory is renamed out of the `job-*` namespace right away; the
/// recursive delete of possibly large media runs on the blocking pool when a
/// runtime is available.
impl Drop for ScratchJob {
    fn drop(&mut self) {
        self.live.lock().remove(&self.id);

        let trash = self.root.join(format!("{TRASH_PREFIX}{}", self.id));
        let target = match std::fs::rename(&self.dir, &trash) {
            Ok(()) => trash,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                debug!("Could not move {} aside: {}", self.dir.display(), e);
                self.dir.clone()
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let dir = self.dir.clone();
                handle.spawn_blocking(move || remove_job_dir(&dir, &target));
            }
            Err(_) => remove_job_dir(&self.dir, &target),
        }
    }
}

fn remove_job_dir(dir: &Path, target: &Path) {
    match std::fs::remove_dir_all(target) {
        Ok(()) => debug!("Cleaned up scratch job {}", dir.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cleanup error for {}: {}", dir.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A job directory with no handle, as a crash would leave it.
    fn leftover_job(root: &Path) -> PathBuf {
        let dir = root.join(format!("{JOB_PREFIX}{}", Uuid::new_v4()));
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("video.mp4"), b"data").unwrap();
        dir
    }

    async fn wait_until_removed(path: &Path) -> bool {
        for _ in 0..100 {
            if !path.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn jobs_get_distinct_dirs_removed_on_drop() {
        let root = tempdir().unwrap();
        let space = ScratchSpace::open(root.path()).await.unwrap();

        let a = space.create_job().await.unwrap();
        let b = space.create_job().await.unwrap();
        assert_ne!(a.dir(), b.dir());

        std::fs::write(a.path("video.mp4"), b"data").unwrap();
        let a_dir = a.dir().to_path_buf();
        let trash = root.path().join(format!("{TRASH_PREFIX}{}", a.id()));
        assert_eq!(space.live_jobs(), 2);
        drop(a);

        assert!(!a_dir.exists());
        assert!(b.dir().exists());
        assert_eq!(space.live_jobs(), 1);
        assert!(wait_until_removed(&trash).await, "trash was never deleted");
    }

    #[test]
    fn drop_outside_a_runtime_removes_inline() {
        let root = tempdir().unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let space = rt.block_on(ScratchSpace::open(root.path())).unwrap();
        let job = rt.block_on(space.create_job()).unwrap();
        std::fs::write(job.path("video.mp4"), b"data").unwrap();
        drop(rt);

        drop(job);
        assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn find_file_skips_partials() {
        let root = tempdir().unwrap();
        let space = ScratchSpace::open(root.path()).await.unwrap();
        let job = space.create_job().await.unwrap();

        std::fs::write(job.path("video.mp4.part"), b"x").unwrap();
        assert_eq!(job.find_file("video").await.unwrap(), None);

        std::fs::write(job.path("video.webm"), b"x").unwrap();
        std::fs::write(job.path("audio.m4a"), b"x").unwrap();
        assert_eq!(
            job.find_file("video").await.unwrap(),
            Some(job.path("video.webm"))
        );
    }

    #[tokio::test]
    async fn purge_leaves_foreign_entries_alone() {
        let root = tempdir().unwrap();
        let space = ScratchSpace::open(root.path()).await.unwrap();
        let job_dir = leftover_job(root.path());
        let trash = root.path().join(format!("{TRASH_PREFIX}{}", Uuid::new_v4()));
        std::fs::create_dir(&trash).unwrap();
        std::fs::create_dir(root.path().join("keep-me")).unwrap();

        assert_eq!(space.purge().await.unwrap(), 1);
        assert!(!job_dir.exists());
        assert!(!trash.exists());
        assert!(root.path().join("keep-me").exists());
    }

    #[tokio::test]
    async fn sweep_keeps_fresh_jobs() {
        let root = tempdir().unwrap();
        let space = ScratchSpace::open(root.path()).await.unwrap();
        let stale = leftover_job(root.path());

        assert_eq!(space.sweep_older_than(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(stale.exists());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(space.sweep_older_than(Duration::from_millis(1)).await.unwrap(), 1);
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn sweep_never_removes_a_job_in_use() {
        let root = tempdir().unwrap();
        let space = ScratchSpace::open(root.path()).await.unwrap();
        let job = space.create_job().await.unwrap();
        std::fs::write(job.path("output.mp4"), b"still streaming").unwrap();
        let stale = leftover_job(root.path());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(space.sweep_older_than(Duration::from_millis(1)).await.unwrap(), 1);
        assert!(!stale.exists());
        assert!(job.path("output.mp4").exists());

        let dir = job.dir().to_path_buf();
        drop(job);
        assert!(!dir.exists());
    }
}
