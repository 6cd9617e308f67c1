//! Table manager: a catalog of tables, each a chain of data pages. Places
//! inserts with first-fit-in-chain-order, spills oversized tuples into
//! overflow chains, and tombstones deletes without reclaiming page space.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::codec::{self, Schema, Value};
use crate::error::{DiskError, PageError, StorageError};
use crate::ids::{PageId, RowId, NO_PAGE};
use crate::page::{overflow_chunk_capacity, PageType, SLOT_SIZE};
use crate::pool::BufferPool;

const FORWARD_MARKER: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct Table {
    pub schema: Schema,
    pub first_page_id: PageId,
    pub row_count: u32,
}

/// Per-table catalog and page-chain bookkeeping. Holds no pins across
/// calls; every page touched by an operation is unpinned before the
/// operation returns (§5's scoped-borrow discipline).
#[derive(Default)]
pub struct TableManager {
    tables: HashMap<String, Table>,
    order: Vec<String>,
}

impl TableManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(
        &mut self,
        pool: &BufferPool,
        name: &str,
        schema: Schema,
    ) -> Result<(), StorageError> {
        if self.tables.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        validate_schema(&schema, pool.page_size())?;

        let (first_page_id, pin) = pool.new_page(PageType::Data)?;
        pin.finish(true);

        self.tables.insert(
            name.to_string(),
            Table {
                schema,
                first_page_id,
                row_count: 0,
            },
        );
        self.order.push(name.to_string());
        info!(table = name, first_page_id, "table created");
        Ok(())
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.tables.get(name).map(|t| &t.schema)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn insert(
        &mut self,
        pool: &BufferPool,
        overflow_threshold: u32,
        name: &str,
        values: &[Value],
    ) -> Result<RowId, StorageError> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))?;

        let encoded = codec::encode(&table.schema, values)?;

        let overflow_head = if encoded.len() as u32 > overflow_threshold {
            Some(write_overflow_chain(pool, &encoded)?)
        } else {
            None
        };

        let tuple_bytes = match overflow_head {
            Some(head) => encode_forwarding(head),
            None => encoded,
        };

        match place_tuple(pool, table.first_page_id, &tuple_bytes) {
            Ok(row_id) => {
                table.row_count += 1;
                Ok(row_id)
            }
            Err(e) => {
                if let Some(head) = overflow_head {
                    let _ = free_overflow_chain(pool, head);
                }
                Err(e)
            }
        }
    }

    pub fn get(
        &self,
        pool: &BufferPool,
        name: &str,
        row_id: RowId,
    ) -> Result<Vec<Value>, StorageError> {
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))?;

        let pin = fetch_data_page(pool, row_id.page_id)?;
        let raw = pin
            .with_page(|p| p.read(row_id.slot_index).map(|b| b.to_vec()))
            .map_err(|e| StorageError::from_page_error(row_id.page_id, e))?;
        pin.finish(false);

        let bytes = match decode_forwarding(&raw) {
            Some(head) => read_overflow_chain(pool, head)?,
            None => raw,
        };
        codec::decode(&table.schema, &bytes)
    }

    pub fn delete(
        &mut self,
        pool: &BufferPool,
        name: &str,
        row_id: RowId,
    ) -> Result<bool, StorageError> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))?;

        let pin = fetch_data_page(pool, row_id.page_id)?;
        let forwarding_head = pin
            .with_page(|p| p.read(row_id.slot_index).map(|b| b.to_vec()))
            .ok()
            .and_then(|raw| decode_forwarding(&raw));

        let transitioned = pin
            .with_page(|p| p.delete(row_id.slot_index))
            .map_err(|e| StorageError::from_page_error(row_id.page_id, e))?;
        pin.finish(transitioned);

        if transitioned {
            if let Some(head) = forwarding_head {
                free_overflow_chain(pool, head)?;
            }
            table.row_count -= 1;
            debug!(table = name, row = %row_id, "row deleted");
        }
        Ok(transitioned)
    }

    #[allow(clippy::type_complexity)]
    pub fn scan(
        &self,
        pool: &BufferPool,
        name: &str,
    ) -> Result<Vec<(RowId, Result<Vec<Value>, StorageError>)>, StorageError> {
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))?;

        let mut out = Vec::new();
        let mut current = table.first_page_id;
        let mut iterations = 0u32;

        while current != NO_PAGE {
            iterations = bound_chain_walk(iterations, pool)?;

            let pin = pool.fetch(current)?;
            let (slot_count, next) = pin.with_page(|p| (p.slot_count(), p.get_next()));

            for slot in 0..slot_count {
                let raw = match pin.with_page(|p| p.read(slot).map(|b| b.to_vec())) {
                    Ok(bytes) => bytes,
                    Err(PageError::Tombstoned(_)) => continue,
                    Err(e) => {
                        out.push((
                            RowId::new(current, slot),
                            Err(StorageError::from_page_error(current, e)),
                        ));
                        continue;
                    }
                };

                let row_id = RowId::new(current, slot);
                let decoded = match decode_forwarding(&raw) {
                    Some(head) => {
                        read_overflow_chain(pool, head).and_then(|b| codec::decode(&table.schema, &b))
                    }
                    None => codec::decode(&table.schema, &raw),
                };
                out.push((row_id, decoded));
            }

            pin.finish(false);
            current = next;
        }

        Ok(out)
    }

    pub fn drop_table(&mut self, pool: &BufferPool, name: &str) -> Result<bool, StorageError> {
        let Some(table) = self.tables.remove(name) else {
            return Ok(false);
        };
        self.order.retain(|n| n != name);

        let mut current = table.first_page_id;
        let mut iterations = 0u32;

        while current != NO_PAGE {
            iterations = bound_chain_walk(iterations, pool)?;

            let pin = pool.fetch(current)?;
            let (slot_count, next) = pin.with_page(|p| (p.slot_count(), p.get_next()));

            let mut forwarding_heads = Vec::new();
            for slot in 0..slot_count {
                if let Ok(raw) = pin.with_page(|p| p.read(slot).map(|b| b.to_vec())) {
                    if let Some(head) = decode_forwarding(&raw) {
                        forwarding_heads.push(head);
                    }
                }
            }
            pin.finish(false);

            for head in forwarding_heads {
                free_overflow_chain(pool, head)?;
            }
            pool.drop_page(current)?;
            current = next;
        }

        info!(table = name, "table dropped");
        Ok(true)
    }
}

fn bound_chain_walk(iterations: u32, pool: &BufferPool) -> Result<u32, StorageError> {
    let next = iterations + 1;
    if next > pool.disk_capacity() {
        return Err(StorageError::Corrupt(
            "page chain walk exceeded disk capacity; possible cycle".into(),
        ));
    }
    Ok(next)
}

fn fetch_data_page(
    pool: &BufferPool,
    page_id: PageId,
) -> Result<crate::pool::FramePin, StorageError> {
    pool.fetch(page_id).map_err(|e| match e {
        StorageError::Disk(DiskError::InvalidPage(p)) => StorageError::BadPage(p),
        other => other,
    })
}

/// Places `tuple_bytes` in the first chain page (in chain order) with
/// enough free space, allocating and splicing in a new tail page if none
/// fits. Chosen over "last page first" per the spec's documented default.
fn place_tuple(
    pool: &BufferPool,
    first_page_id: PageId,
    tuple_bytes: &[u8],
) -> Result<RowId, StorageError> {
    let needed = tuple_bytes.len() as u16 + SLOT_SIZE as u16;
    let mut current = first_page_id;
    let mut iterations = 0u32;

    loop {
        iterations = bound_chain_walk(iterations, pool)?;

        let pin = pool.fetch(current)?;
        let free = pin.with_page(|p| p.free_space());

        if free >= needed {
            let slot = pin
                .with_page(|p| p.insert(tuple_bytes))
                .map_err(|e| StorageError::from_page_error(current, e))?;
            pin.finish(true);
            return Ok(RowId::new(current, slot));
        }

        let next = pin.with_page(|p| p.get_next());
        pin.finish(false);

        if next == NO_PAGE {
            let (new_page_id, new_pin) = pool.new_page(PageType::Data)?;

            let tail_pin = pool.fetch(current)?;
            tail_pin.with_page(|p| p.set_next(new_page_id));
            tail_pin.finish(true);

            let slot = new_pin
                .with_page(|p| p.insert(tuple_bytes))
                .map_err(|e| StorageError::from_page_error(new_page_id, e))?;
            new_pin.finish(true);
            return Ok(RowId::new(new_page_id, slot));
        }

        current = next;
    }
}

fn encode_forwarding(head: PageId) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    out.push(FORWARD_MARKER);
    out.extend_from_slice(&head.to_le_bytes());
    out
}

fn decode_forwarding(bytes: &[u8]) -> Option<PageId> {
    if bytes.len() == 5 && bytes[0] == FORWARD_MARKER {
        Some(u32::from_le_bytes(bytes[1..5].try_into().unwrap()))
    } else {
        None
    }
}

fn write_overflow_chain(pool: &BufferPool, bytes: &[u8]) -> Result<PageId, StorageError> {
    let total_len = bytes.len() as u32;
    let capacity = overflow_chunk_capacity(pool.page_size() as usize);
    let mut chunks: Vec<&[u8]> = bytes.chunks(capacity.max(1)).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }

    let mut page_ids = Vec::with_capacity(chunks.len());
    let write_result: Result<(), StorageError> = (|| {
        for chunk in &chunks {
            let (page_id, pin) = pool.new_page(PageType::Overflow)?;
            pin.with_page(|p| p.write_overflow_chunk(total_len, chunk));
            pin.finish(true);
            page_ids.push(page_id);
        }
        for window in page_ids.windows(2) {
            let (cur, next) = (window[0], window[1]);
            let pin = pool.fetch(cur)?;
            pin.with_page(|p| p.set_next(next));
            pin.finish(true);
        }
        Ok(())
    })();

    match write_result {
        Ok(()) => Ok(page_ids[0]),
        Err(e) => {
            for page_id in &page_ids {
                let _ = pool.drop_page(*page_id);
            }
            Err(e)
        }
    }
}

fn read_overflow_chain(pool: &BufferPool, head: PageId) -> Result<Vec<u8>, StorageError> {
    let mut out = Vec::new();
    let mut total_len = 0u32;
    let mut current = head;
    let mut iterations = 0u32;

    while current != NO_PAGE {
        iterations = bound_chain_walk(iterations, pool)?;

        let pin = pool.fetch(current)?;
        let (this_total, next) = pin.with_page(|p| {
            let (tl, chunk) = p.read_overflow_chunk();
            out.extend_from_slice(chunk);
            (tl, p.get_next())
        });
        pin.finish(false);

        total_len = this_total;
        current = next;
    }

    out.truncate(total_len as usize);
    Ok(out)
}

fn free_overflow_chain(pool: &BufferPool, head: PageId) -> Result<(), StorageError> {
    let mut current = head;
    let mut iterations = 0u32;

    while current != NO_PAGE {
        iterations = bound_chain_walk(iterations, pool)?;

        let next = {
            let pin = pool.fetch(current)?;
            let next = pin.with_page(|p| p.get_next());
            pin.finish(false);
            next
        };
        pool.drop_page(current)?;
        current = next;
    }
    Ok(())
}

fn validate_schema(schema: &Schema, page_size: u32) -> Result<(), StorageError> {
    if schema.columns.is_empty() {
        return Err(StorageError::InvalidSchema(
            "a table needs at least one column".into(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for column in &schema.columns {
        if !seen.insert(column.name.as_str()) {
            return Err(StorageError::InvalidSchema(format!(
                "duplicate column name: {}",
                column.name
            )));
        }
        if let Some(max_len) = column.ty.max_len() {
            let cap = page_size.saturating_sub(20);
            if max_len == 0 || max_len > cap {
                return Err(StorageError::InvalidSchema(format!(
                    "column {} max_len {} must be in 1..={}",
                    column.name, max_len, cap
                )));
            }
        }
    }
    Ok(())
}
