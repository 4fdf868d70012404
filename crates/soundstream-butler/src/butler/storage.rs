//! Where butler threads open and create files.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

/// An open file the butler can read, write and seek.
pub trait FileHandle: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> FileHandle for T {}

/// File system access used by the butler threads.
///
/// Only the butler calls into this, never the audio callback.
pub trait Storage: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>>;

    /// Create or truncate `path` for writing.
    fn create(&self, path: &Path) -> io::Result<Box<dyn FileHandle>>;
}

/// The local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        Ok(Box::new(File::open(path)?))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(file))
    }
}
