use std::fmt;

use crate::error::StorageError;

/// Dense page identifier allocated by the disk manager.
pub type PageId = u32;

/// Sentinel meaning "no page": end-of-chain, empty next pointer, not resident.
pub const NO_PAGE: PageId = PageId::MAX;

/// Index into a page's slot directory.
pub type SlotIndex = u16;

/// Stable identity of a row: the page it lives on and its slot directory
/// index on that page. Textually rendered and parsed as `"p:s"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub page_id: PageId,
    pub slot_index: SlotIndex,
}

impl RowId {
    pub fn new(page_id: PageId, slot_index: SlotIndex) -> Self {
        Self {
            page_id,
            slot_index,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot_index)
    }
}

impl std::str::FromStr for RowId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (page_part, slot_part) = s
            .split_once(':')
            .ok_or_else(|| StorageError::InvalidRowId(s.to_string()))?;
        let page_id = page_part
            .parse::<PageId>()
            .map_err(|_| StorageError::InvalidRowId(s.to_string()))?;
        let slot_index = slot_part
            .parse::<SlotIndex>()
            .map_err(|_| StorageError::InvalidRowId(s.to_string()))?;
        Ok(RowId::new(page_id, slot_index))
    }
}
