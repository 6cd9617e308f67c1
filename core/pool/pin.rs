use std::cell::Cell;
use std::rc::Rc;

use crate::ids::PageId;
use crate::page::SlottedPage;

use super::{FrameId, SharedPool};

/// A scoped borrow of a frame buffer. Guarantees the acquire-use-release
/// discipline the spec demands: dropping a pin without calling [`finish`]
/// releases it as non-dirty, so an early return can never leak a pin.
///
/// [`finish`]: FramePin::finish
pub struct FramePin {
    pool: SharedPool,
    frame_id: FrameId,
    page_id: PageId,
    dirty: Cell<bool>,
}

impl FramePin {
    pub(super) fn new(pool: SharedPool, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            dirty: Cell::new(false),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Marks the frame dirty; it will be written back on eventual eviction
    /// or flush. Dirtiness accumulates for the life of the pin (§4.3: the
    /// dirty bit is OR'd in on unpin).
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    /// Runs `f` against the page this pin holds and returns its result.
    pub fn with_page<R>(&self, f: impl FnOnce(&mut SlottedPage) -> R) -> R {
        let mut inner = self.pool.borrow_mut();
        let frame = &mut inner.frames[self.frame_id];
        let mut page = SlottedPage::new(&mut frame.buf);
        f(&mut page)
    }

    /// Releases the pin explicitly, OR-ing `dirty` into the frame's dirty
    /// bit. Equivalent to dropping the pin after `mark_dirty()` but reads
    /// better at call sites that know their dirtiness up front.
    pub fn finish(self, dirty: bool) {
        if dirty {
            self.dirty.set(true);
        }
        // `self` drops at the end of this call, which performs the release.
    }
}

impl Drop for FramePin {
    fn drop(&mut self) {
        self.pool.borrow_mut().unpin(self.frame_id, self.dirty.get());
    }
}
