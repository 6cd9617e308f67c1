use crate::ids::PageId;

/// A cell in the buffer pool's frame array: holds at most one resident page.
pub struct Frame {
    pub page_id: Option<PageId>,
    pub pin_count: u32,
    pub is_dirty: bool,
    pub is_occupied: bool,
    pub buf: Vec<u8>,
}

impl Frame {
    pub fn empty(page_size: usize) -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            is_dirty: false,
            is_occupied: false,
            buf: vec![0u8; page_size],
        }
    }
}
