//! Pager for SiltDB
//!
//! The pager owns the database file and a keyed cache of every page touched
//! so far. A single mutex serializes cache access and file I/O; the cache
//! hands out shared page handles whose mutation is serialized above this
//! layer by the table locks.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use super::page::{Page, PageId, PageKind, PAGE_SIZE};
use crate::error::{Error, Result};

/// Shared handle to a cached page
pub type PageHandle = Arc<RwLock<Page>>;

/// File-backed page allocator and cache
#[derive(Debug)]
pub struct Pager {
    inner: Mutex<PagerInner>,
}

#[derive(Debug)]
struct PagerInner {
    /// Database file, pages at offset `id * PAGE_SIZE`
    file: File,
    /// Number of pages in the file
    num_pages: u32,
    /// Every page touched so far stays resident
    cache: HashMap<PageId, PageHandle>,
}

impl Pager {
    /// Open or create the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let num_pages = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        Ok(Self {
            inner: Mutex::new(PagerInner {
                file,
                num_pages,
                cache: HashMap::new(),
            }),
        })
    }

    /// Get a page by id, reading it from disk on a cache miss.
    pub fn get(&self, page_id: PageId) -> Result<PageHandle> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(handle) = inner.cache.get(&page_id) {
            return Ok(handle.clone());
        }

        if page_id >= inner.num_pages {
            return Err(Error::PageOutOfRange(page_id));
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        inner
            .file
            .seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        inner.file.read_exact(&mut buf).map_err(short_read)?;

        let handle: PageHandle = Arc::new(RwLock::new(Page::deserialize(&buf)?));
        inner.cache.insert(page_id, handle.clone());
        Ok(handle)
    }

    /// Allocate a fresh page with the next sequential id.
    ///
    /// The page is written through to disk immediately so the file length
    /// always reflects `num_pages`.
    pub fn allocate(&self, kind: PageKind) -> Result<PageHandle> {
        let mut inner = self.inner.lock().unwrap();

        let page_id = inner.num_pages;
        let page = Page::new(page_id, kind);
        write_page(&mut inner.file, &page)?;

        let handle: PageHandle = Arc::new(RwLock::new(page));
        inner.cache.insert(page_id, handle.clone());
        inner.num_pages += 1;
        Ok(handle)
    }

    /// Write one cached page back to disk.
    pub fn flush(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        let handle = inner
            .cache
            .get(&page_id)
            .cloned()
            .ok_or(Error::PageOutOfRange(page_id))?;
        let page = handle.read().unwrap();
        write_page(&mut inner.file, &page)
    }

    /// Write every cached page back to disk, then fsync the file.
    pub fn flush_all(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        let handles: Vec<PageHandle> = inner.cache.values().cloned().collect();
        for handle in handles {
            let page = handle.read().unwrap();
            write_page(&mut inner.file, &page)?;
        }

        inner.file.sync_all()?;
        Ok(())
    }

    /// Flush everything; the file descriptor closes when the pager drops.
    pub fn close(&self) -> Result<()> {
        self.flush_all()
    }

    /// Number of pages in the file
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().unwrap().num_pages
    }
}

fn write_page(file: &mut File, page: &Page) -> Result<()> {
    file.seek(SeekFrom::Start(page.id as u64 * PAGE_SIZE as u64))?;
    file.write_all(&page.serialize())?;
    Ok(())
}

fn short_read(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::ShortRead
    } else {
        Error::IoError(err)
    }
}
