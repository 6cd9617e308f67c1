//! Buffer pool: a bounded set of frames caching disk pages behind pin
//! counts, a dirty bit, and LRU eviction of unpinned frames.

mod frame;
mod lru;
mod pin;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::disk::DiskManager;
use crate::error::StorageError;
use crate::ids::PageId;
use crate::page::PageType;

pub use frame::Frame;
pub use pin::FramePin;

pub(crate) type FrameId = usize;
pub(crate) type SharedPool = Rc<RefCell<PoolInner>>;

fn poisoned_error() -> StorageError {
    StorageError::Corrupt("buffer pool is poisoned; only snapshots remain callable".into())
}

pub(crate) struct PoolInner {
    pub(crate) page_size: u32,
    pub(crate) frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    lru: lru::LruList,
    disk: DiskManager,
    hit_count: u64,
    miss_count: u64,
    disk_read_count: u64,
    disk_write_count: u64,
    /// Set once a fatal invariant violation is observed. Once poisoned, every
    /// mutating call fails fast with `Corrupt` rather than touching frames
    /// whose bookkeeping may no longer be trustworthy; reads used by the
    /// snapshot surface (`peek_page`, `frame_infos`, ...) keep working.
    poisoned: bool,
}

/// A snapshot-friendly view of one frame, used by the snapshot surface.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub page_id: Option<PageId>,
    pub pin_count: u32,
    pub is_dirty: bool,
    pub is_occupied: bool,
}

/// Bounded cache of disk pages. Single-threaded: interior mutability via
/// `Rc<RefCell<_>>` lets [`FramePin`] release itself on drop without the
/// caller threading a `&mut BufferPool` through every call site.
pub struct BufferPool {
    inner: SharedPool,
}

impl BufferPool {
    pub fn new(page_size: u32, pool_size: u32, disk_capacity: u32) -> Self {
        let frames = (0..pool_size)
            .map(|_| Frame::empty(page_size as usize))
            .collect();
        let inner = PoolInner {
            page_size,
            frames,
            page_table: HashMap::new(),
            lru: lru::LruList::new(),
            disk: DiskManager::new(page_size, disk_capacity),
            hit_count: 0,
            miss_count: 0,
            disk_read_count: 0,
            disk_write_count: 0,
            poisoned: false,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn pool_size(&self) -> u32 {
        self.inner.borrow().frames.len() as u32
    }

    pub fn page_size(&self) -> u32 {
        self.inner.borrow().page_size
    }

    /// Returns a pinned handle to the frame holding `page_id`, loading it
    /// from disk (possibly evicting the least-recently-used unpinned
    /// frame) if it isn't already resident.
    pub fn fetch(&self, page_id: PageId) -> Result<FramePin, StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.poisoned {
            return Err(poisoned_error());
        }

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            if inner.frames[frame_id].pin_count == 0 {
                inner.lru.remove(frame_id);
            }
            inner.frames[frame_id].pin_count += 1;
            inner.hit_count += 1;
            trace!(page_id, frame_id, "buffer pool hit");
            drop(inner);
            return Ok(FramePin::new(self.inner.clone(), frame_id, page_id));
        }

        inner.miss_count += 1;

        let frame_id = match inner.frames.iter().position(|f| !f.is_occupied) {
            Some(id) => id,
            None => match inner.lru.pop_lru() {
                Some(victim) => {
                    Self::evict(&mut inner, victim)?;
                    victim
                }
                None => {
                    debug!(page_id, "buffer pool exhausted on miss");
                    return Err(StorageError::PoolExhausted);
                }
            },
        };

        inner.disk.read(page_id, &mut inner.frames[frame_id].buf)?;
        inner.disk_read_count += 1;
        debug!(page_id, frame_id, "buffer pool miss; loaded from disk");

        let frame = &mut inner.frames[frame_id];
        frame.page_id = Some(page_id);
        frame.is_occupied = true;
        frame.is_dirty = false;
        frame.pin_count = 1;
        inner.page_table.insert(page_id, frame_id);

        drop(inner);
        Ok(FramePin::new(self.inner.clone(), frame_id, page_id))
    }

    fn evict(inner: &mut PoolInner, victim: FrameId) -> Result<(), StorageError> {
        let frame = &mut inner.frames[victim];
        let evicted_page = match frame.page_id {
            Some(p) => p,
            None => {
                inner.poisoned = true;
                warn!(frame_id = victim, "LRU-listed frame had no resident page");
                return Err(StorageError::Corrupt(format!(
                    "frame {victim} was on the LRU list but held no page"
                )));
            }
        };
        if frame.is_dirty {
            inner.disk.write(evicted_page, &frame.buf)?;
            inner.disk_write_count += 1;
            inner.frames[victim].is_dirty = false;
        }
        inner.page_table.remove(&evicted_page);
        Ok(())
    }

    pub(crate) fn unpin(&self, frame_id: FrameId, mark_dirty: bool) {
        self.inner.borrow_mut().unpin(frame_id, mark_dirty);
    }

    /// Allocates a fresh page via the disk manager, fetches it, and
    /// initializes its slotted-page header. Returns it pinned and dirty.
    pub fn new_page(&self, page_type: PageType) -> Result<(PageId, FramePin), StorageError> {
        if self.inner.borrow().poisoned {
            return Err(poisoned_error());
        }
        let page_id = self.inner.borrow_mut().disk.allocate(page_type)?;
        let pin = self.fetch(page_id)?;
        pin.with_page(|page| page.init(page_id, page_type));
        pin.mark_dirty();
        Ok((page_id, pin))
    }

    pub fn flush_page(&self, page_id: PageId) -> Result<bool, StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.poisoned {
            return Err(poisoned_error());
        }
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        if inner.frames[frame_id].is_dirty {
            let buf = inner.frames[frame_id].buf.clone();
            inner.disk.write(page_id, &buf)?;
            inner.disk_write_count += 1;
            inner.frames[frame_id].is_dirty = false;
        }
        Ok(true)
    }

    pub fn flush_all(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.poisoned {
            return Err(poisoned_error());
        }
        let dirty_frames: Vec<FrameId> = inner
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_occupied && f.is_dirty)
            .map(|(id, _)| id)
            .collect();
        for frame_id in dirty_frames {
            let page_id = match inner.frames[frame_id].page_id {
                Some(p) => p,
                None => {
                    inner.poisoned = true;
                    warn!(frame_id, "dirty frame had no resident page");
                    return Err(StorageError::Corrupt(format!(
                        "frame {frame_id} was marked dirty but held no page"
                    )));
                }
            };
            let buf = inner.frames[frame_id].buf.clone();
            inner.disk.write(page_id, &buf)?;
            inner.disk_write_count += 1;
            inner.frames[frame_id].is_dirty = false;
        }
        Ok(())
    }

    /// Evicts `page_id` without writing it back and frees it on disk.
    /// Fails with `Pinned` if the page is resident and still pinned.
    pub fn drop_page(&self, page_id: PageId) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.poisoned {
            return Err(poisoned_error());
        }
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            if inner.frames[frame_id].pin_count > 0 {
                return Err(StorageError::Pinned(page_id));
            }
            inner.lru.remove(frame_id);
            inner.page_table.remove(&page_id);
            let frame = &mut inner.frames[frame_id];
            frame.page_id = None;
            frame.is_occupied = false;
            frame.is_dirty = false;
        }
        inner.disk.free(page_id);
        Ok(())
    }

    /// Reads `page_id`'s current bytes without pinning, bumping any
    /// counter, or touching LRU recency — from the resident frame if
    /// cached, otherwise straight off disk. Used only by the snapshot
    /// surface, which must never perturb cache state.
    pub fn peek_page(&self, page_id: PageId, out: &mut [u8]) -> Result<(), StorageError> {
        let inner = self.inner.borrow();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            out.copy_from_slice(&inner.frames[frame_id].buf);
            return Ok(());
        }
        inner.disk.read(page_id, out)?;
        Ok(())
    }

    pub fn disk_page_size(&self) -> u32 {
        self.inner.borrow().disk.page_size()
    }

    pub fn disk_capacity(&self) -> u32 {
        self.inner.borrow().disk.capacity()
    }

    pub fn disk_num_allocated(&self) -> u32 {
        self.inner.borrow().disk.num_allocated()
    }

    pub fn disk_page_type(&self, page_id: PageId) -> Option<PageType> {
        self.inner.borrow().disk.page_type(page_id)
    }

    pub fn disk_is_allocated(&self, page_id: PageId) -> bool {
        self.inner.borrow().disk.is_allocated(page_id)
    }

    pub fn hit_count(&self) -> u64 {
        self.inner.borrow().hit_count
    }

    pub fn miss_count(&self) -> u64 {
        self.inner.borrow().miss_count
    }

    pub fn disk_read_count(&self) -> u64 {
        self.inner.borrow().disk_read_count
    }

    pub fn disk_write_count(&self) -> u64 {
        self.inner.borrow().disk_write_count
    }

    pub fn frame_infos(&self) -> Vec<FrameInfo> {
        self.inner
            .borrow()
            .frames
            .iter()
            .map(|f| FrameInfo {
                page_id: f.page_id,
                pin_count: f.pin_count,
                is_dirty: f.is_dirty,
                is_occupied: f.is_occupied,
            })
            .collect()
    }

    pub fn page_table_entries(&self) -> Vec<(PageId, FrameId)> {
        self.inner
            .borrow()
            .page_table
            .iter()
            .map(|(&p, &f)| (p, f))
            .collect()
    }

    pub fn lru_entries(&self) -> Vec<FrameId> {
        self.inner.borrow().lru.iter().collect()
    }

    /// True once a fatal invariant violation has been observed. Mutating
    /// calls (`fetch`, `new_page`, `flush_page`, `flush_all`, `drop_page`)
    /// refuse to run while this holds; reads used by the snapshot surface
    /// keep working.
    pub fn is_poisoned(&self) -> bool {
        self.inner.borrow().poisoned
    }
}

impl PoolInner {
    fn unpin(&mut self, frame_id: FrameId, mark_dirty: bool) {
        let frame = &mut self.frames[frame_id];
        if frame.pin_count > 0 {
            frame.pin_count -= 1;
        } else {
            warn!(frame_id, "unpin called on a frame with zero pins");
        }
        frame.is_dirty |= mark_dirty;
        if frame.pin_count == 0 {
            self.lru.push_mru(frame_id);
        }
    }
}
