//! Read-only binary projections of engine state, stable across versions.
//! Every snapshot is built from the buffer pool's non-recording read path
//! ([`BufferPool::peek_page`]) so taking one never perturbs pin counts,
//! dirty bits, or LRU order.

use crate::ids::{PageId, NO_PAGE};
use crate::page::PageType;
use crate::pool::BufferPool;
use crate::table::Table;

const SENTINEL: u32 = u32::MAX;

fn push_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// `u32 pool_size, u32 page_size, pool_size x {u32 page_id|SENTINEL,
/// u32 pin_count, u8 is_dirty, u8 is_occupied}, u32 page_table_len,
/// page_table_len x (u32 pid, u32 fid), u32 lru_len, lru_len x u32
/// frame_id, u64 hits, u64 misses, u64 disk_reads, u64 disk_writes,
/// u32 disk_num_allocated, u32 disk_max_pages, u32 disk_base_ptr`.
pub fn snapshot_buffer_pool(pool: &BufferPool) -> Vec<u8> {
    let mut out = Vec::new();
    let frames = pool.frame_infos();

    push_u32(&mut out, frames.len() as u32);
    push_u32(&mut out, pool.page_size());

    for frame in &frames {
        push_u32(&mut out, frame.page_id.unwrap_or(SENTINEL));
        push_u32(&mut out, frame.pin_count);
        push_u8(&mut out, frame.is_dirty as u8);
        push_u8(&mut out, frame.is_occupied as u8);
    }

    let page_table = pool.page_table_entries();
    push_u32(&mut out, page_table.len() as u32);
    for (pid, fid) in page_table {
        push_u32(&mut out, pid);
        push_u32(&mut out, fid as u32);
    }

    let lru = pool.lru_entries();
    push_u32(&mut out, lru.len() as u32);
    for frame_id in lru {
        push_u32(&mut out, frame_id as u32);
    }

    push_u64(&mut out, pool.hit_count());
    push_u64(&mut out, pool.miss_count());
    push_u64(&mut out, pool.disk_read_count());
    push_u64(&mut out, pool.disk_write_count());
    push_u32(&mut out, pool.disk_num_allocated());
    push_u32(&mut out, pool.disk_capacity());
    push_u32(&mut out, 0); // disk_base_ptr: no meaningful address to report

    out
}

/// `u32 max_pages, u32 page_size, u32 num_allocated, u32 disk_base_ptr,
/// max_pages x {u8 is_allocated, u8 page_type}`.
pub fn snapshot_disk(pool: &BufferPool) -> Vec<u8> {
    let mut out = Vec::new();
    let max_pages = pool.disk_capacity();

    push_u32(&mut out, max_pages);
    push_u32(&mut out, pool.disk_page_size());
    push_u32(&mut out, pool.disk_num_allocated());
    push_u32(&mut out, 0); // disk_base_ptr

    for page_id in 0..max_pages {
        let is_allocated = pool.disk_is_allocated(page_id);
        let page_type = pool.disk_page_type(page_id).unwrap_or(PageType::Free);
        push_u8(&mut out, is_allocated as u8);
        push_u8(&mut out, page_type as u8);
    }

    out
}

/// `u32 page_size, u32 page_id, u8 page_type, u16 slot_count, u16
/// free_start, u16 free_end, u32 next_page_id, u16 free_space, u16
/// num_slots_for_view, num_slots x {u16 offset, u16 length}, page_size
/// bytes raw`.
pub fn snapshot_page(pool: &BufferPool, page_id: PageId) -> Vec<u8> {
    let page_size = pool.disk_page_size() as usize;
    let mut buf = vec![0u8; page_size];
    if pool.peek_page(page_id, &mut buf).is_err() {
        // Unallocated page: emit a zeroed, empty-looking view rather than
        // failing, so a host can still render "nothing here" consistently.
        buf.fill(0);
    }
    let page = crate::page::SlottedPage::new(&mut buf);

    let mut out = Vec::new();
    push_u32(&mut out, page_size as u32);
    push_u32(&mut out, page.page_id());
    push_u8(&mut out, page.page_type() as u8);
    push_u16(&mut out, page.slot_count());
    push_u16(&mut out, page.free_start());
    push_u16(&mut out, page.free_end());
    push_u32(&mut out, page.next_page_id());
    push_u16(&mut out, page.free_space());

    let slot_count = page.slot_count();
    push_u16(&mut out, slot_count);
    for i in 0..slot_count {
        let (offset, length) = page.slot(i).unwrap_or((0, 0));
        push_u16(&mut out, offset);
        push_u16(&mut out, length);
    }

    out.extend_from_slice(page.raw());
    out
}

/// `u16 name_len, name_len UTF-8 bytes, u32 row_count, u32
/// first_page_id, u16 num_cols, num_cols x {u16 name_len, bytes, u8
/// type_tag, u8 nullable, u16 max_len}, u32 page_count, page_count x u32
/// page_ids`.
pub fn snapshot_table(pool: &BufferPool, name: &str, table: &Table) -> Vec<u8> {
    let mut out = Vec::new();

    let name_bytes = name.as_bytes();
    push_u16(&mut out, name_bytes.len() as u16);
    out.extend_from_slice(name_bytes);

    push_u32(&mut out, table.row_count);
    push_u32(&mut out, table.first_page_id);

    push_u16(&mut out, table.schema.columns.len() as u16);
    for column in &table.schema.columns {
        let col_name = column.name.as_bytes();
        push_u16(&mut out, col_name.len() as u16);
        out.extend_from_slice(col_name);
        push_u8(&mut out, column.ty.type_tag());
        push_u8(&mut out, column.nullable as u8);
        push_u16(&mut out, column.ty.max_len().unwrap_or(0) as u16);
    }

    let page_ids = collect_page_chain(pool, table.first_page_id);
    push_u32(&mut out, page_ids.len() as u32);
    for page_id in &page_ids {
        push_u32(&mut out, *page_id);
    }

    out
}

fn collect_page_chain(pool: &BufferPool, first_page_id: PageId) -> Vec<PageId> {
    let page_size = pool.disk_page_size() as usize;
    let mut ids = Vec::new();
    let mut current = first_page_id;
    let mut iterations = 0u32;

    while current != NO_PAGE {
        iterations += 1;
        if iterations > pool.disk_capacity() {
            break; // corrupt/cyclic chain; stop rather than hang the snapshot
        }
        ids.push(current);
        let mut buf = vec![0u8; page_size];
        if pool.peek_page(current, &mut buf).is_err() {
            break;
        }
        current = crate::page::SlottedPage::new(&mut buf).next_page_id();
    }

    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Column, ColumnType};
    use crate::page::PageType;
    use crate::table::TableManager;

    fn pool() -> BufferPool {
        BufferPool::new(128, 4, 16)
    }

    #[test]
    fn buffer_pool_snapshot_has_expected_prefix() {
        let bp = pool();
        let snap = snapshot_buffer_pool(&bp);
        let pool_size = u32::from_le_bytes(snap[0..4].try_into().unwrap());
        let page_size = u32::from_le_bytes(snap[4..8].try_into().unwrap());
        assert_eq!(pool_size, 4);
        assert_eq!(page_size, 128);
    }

    #[test]
    fn disk_snapshot_reports_allocation_state() {
        let bp = pool();
        let (page_id, pin) = bp.new_page(PageType::Data).unwrap();
        pin.finish(true);

        let snap = snapshot_disk(&bp);
        let max_pages = u32::from_le_bytes(snap[0..4].try_into().unwrap());
        assert_eq!(max_pages, 16);
        let per_page_offset = 16 + page_id as usize * 2;
        assert_eq!(snap[per_page_offset], 1); // is_allocated
        assert_eq!(snap[per_page_offset + 1], PageType::Data as u8);
    }

    #[test]
    fn page_snapshot_reflects_inserted_slots() {
        let bp = pool();
        let (page_id, pin) = bp.new_page(PageType::Data).unwrap();
        pin.with_page(|p| p.insert(b"hello").unwrap());
        pin.finish(true);

        let snap = snapshot_page(&bp, page_id);
        let slot_count = u16::from_le_bytes(snap[9..11].try_into().unwrap());
        assert_eq!(slot_count, 1);
    }

    #[test]
    fn table_snapshot_includes_schema_and_page_chain() {
        let bp = pool();
        let mut tm = TableManager::new();
        let schema = crate::codec::Schema {
            columns: vec![Column {
                name: "id".into(),
                ty: ColumnType::Int32,
                nullable: false,
            }],
        };
        tm.create_table(&bp, "t", schema).unwrap();
        let table = tm.table("t").unwrap();

        let snap = snapshot_table(&bp, "t", table);
        let name_len = u16::from_le_bytes(snap[0..2].try_into().unwrap());
        assert_eq!(name_len, 1);
        assert_eq!(&snap[2..3], b"t");
    }
}
