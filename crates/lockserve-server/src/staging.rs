//! Private staging files for PUT bodies
//!
//! A PUT body is received into a staging file before the target's write
//! lock is taken, so a slow upload never blocks readers of the target.
//! The file is unlinked when the `StagedFile` is dropped, whatever path the
//! request took.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::os::fd::FromRawFd;
use std::path::{Path, PathBuf};

use lockserve_core::kwarn;
use nix::unistd::mkstemp;

/// File name prefix for staging files
pub const STAGE_PREFIX: &str = ".lockserve-stage";

pub struct StagedFile {
    path: PathBuf,
    file: File,
}

impl StagedFile {
    /// Create an empty staging file in `dir`
    ///
    /// The name combines the worker id and a per-server request sequence
    /// number with `mkstemp`'s random suffix, and `mkstemp` creates it
    /// exclusively, so two requests can never share a staging file.
    pub fn create(dir: &Path, worker_id: usize, seq: u64) -> io::Result<Self> {
        let template = dir.join(format!("{}-w{}-r{}-XXXXXX", STAGE_PREFIX, worker_id, seq));
        let (fd, path) = mkstemp(template.as_path()).map_err(io::Error::from)?;
        // Safety: mkstemp just returned this descriptor and nothing else owns it.
        let file = unsafe { File::from_raw_fd(fd) };
        Ok(Self { path, file })
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Size of the staged content
    #[cfg(test)]
    pub(crate) fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Rewind so the staged bytes can be read back from the start
    pub fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            kwarn!("failed to remove staging file {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_unique_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = StagedFile::create(dir.path(), 0, 1).unwrap();
        let b = StagedFile::create(dir.path(), 0, 1).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().exists());

        let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".lockserve-stage-w0-r1-"), "{name}");

        let (pa, pb) = (a.path().to_path_buf(), b.path().to_path_buf());
        drop(a);
        drop(b);
        assert!(!pa.exists());
        assert!(!pb.exists());
    }

    #[test]
    fn test_write_rewind_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage = StagedFile::create(dir.path(), 3, 9).unwrap();
        stage.file_mut().write_all(b"staged bytes").unwrap();
        assert_eq!(stage.len().unwrap(), 12);

        stage.rewind().unwrap();
        let mut back = String::new();
        stage.file_mut().read_to_string(&mut back).unwrap();
        assert_eq!(back, "staged bytes");
    }

    #[test]
    fn test_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(StagedFile::create(&missing, 0, 0).is_err());
    }
}
