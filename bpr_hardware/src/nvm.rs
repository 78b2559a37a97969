//! Non-volatile byte stores.
//!
//! Both stores start "erased" (every byte 0xFF) like a fresh EEPROM.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bpr_traits::NonVolatile;

use crate::error::{HwError, Result};

/// Value of an erased cell.
pub const ERASED: u8 = 0xFF;

fn check_range(offset: usize, len: usize, capacity: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(HwError::OutOfRange {
            offset,
            len,
            capacity,
        }),
    }
}

/// File-backed store. Every write is flushed with `sync_data` before returning.
#[derive(Debug)]
pub struct FileStore {
    file: File,
    capacity: usize,
}

impl FileStore {
    /// Open `path`, creating an erased image of `capacity` bytes if missing or short.
    pub fn open(path: &Path, capacity: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < capacity {
            file.seek(SeekFrom::Start(len as u64))?;
            file.write_all(&vec![ERASED; capacity - len])?;
            file.sync_data()?;
            tracing::info!(path = %path.display(), capacity, "initialized erased store image");
        }
        Ok(Self { file, capacity })
    }
}

impl NonVolatile for FileStore {
    fn read(
        &mut self,
        offset: usize,
        buf: &mut [u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        check_range(offset, buf.len(), self.capacity)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(
        &mut self,
        offset: usize,
        data: &[u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        check_range(offset, data.len(), self.capacity)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;
        tracing::trace!(offset, len = data.len(), "store write-through");
        Ok(())
    }
}

/// In-memory store; counts writes so tests can observe write-through.
#[derive(Debug, Clone)]
pub struct MemStore {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![ERASED; capacity],
            writes: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of `write` calls served.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl NonVolatile for MemStore {
    fn read(
        &mut self,
        offset: usize,
        buf: &mut [u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        check_range(offset, buf.len(), self.bytes.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(
        &mut self,
        offset: usize,
        data: &[u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        check_range(offset, data.len(), self.bytes.len())?;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}
