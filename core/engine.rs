//! The engine facade: the one type a host constructs directly. Owns a
//! `BufferPool` (itself backed by a `DiskManager`) and a `TableManager`,
//! and re-exposes their operations as a single flat surface.

use tracing::info;

use crate::codec::{Schema, Value};
use crate::config::EngineConfig;
use crate::error::StorageError;
use crate::ids::RowId;
use crate::pool::BufferPool;
use crate::snapshot;
use crate::table::{Table, TableManager};

pub struct Engine {
    config: EngineConfig,
    pool: BufferPool,
    tables: TableManager,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, StorageError> {
        let config = config.validate()?;
        let pool = BufferPool::new(config.page_size, config.pool_size, config.disk_capacity);
        let tables = TableManager::new();

        info!(
            page_size = config.page_size,
            pool_size = config.pool_size,
            disk_capacity = config.disk_capacity,
            overflow_threshold = config.overflow_threshold,
            "engine constructed"
        );

        Ok(Self {
            config,
            pool,
            tables,
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<(), StorageError> {
        self.tables.create_table(&self.pool, name, schema)
    }

    pub fn drop_table(&mut self, name: &str) -> Result<bool, StorageError> {
        self.tables.drop_table(&self.pool, name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.tables.list_tables()
    }

    pub fn table_schema(&self, name: &str) -> Option<&Schema> {
        self.tables.schema(name)
    }

    pub fn insert(&mut self, name: &str, values: &[Value]) -> Result<RowId, StorageError> {
        self.tables
            .insert(&self.pool, self.config.overflow_threshold, name, values)
    }

    pub fn get(&self, name: &str, row_id: RowId) -> Result<Vec<Value>, StorageError> {
        self.tables.get(&self.pool, name, row_id)
    }

    pub fn delete(&mut self, name: &str, row_id: RowId) -> Result<bool, StorageError> {
        self.tables.delete(&self.pool, name, row_id)
    }

    #[allow(clippy::type_complexity)]
    pub fn scan(
        &self,
        name: &str,
    ) -> Result<Vec<(RowId, Result<Vec<Value>, StorageError>)>, StorageError> {
        self.tables.scan(&self.pool, name)
    }

    pub fn flush_all(&self) -> Result<(), StorageError> {
        self.pool.flush_all()
    }

    pub fn snapshot_buffer_pool(&self) -> Vec<u8> {
        snapshot::snapshot_buffer_pool(&self.pool)
    }

    pub fn snapshot_disk(&self) -> Vec<u8> {
        snapshot::snapshot_disk(&self.pool)
    }

    pub fn snapshot_page(&self, page_id: crate::ids::PageId) -> Vec<u8> {
        snapshot::snapshot_page(&self.pool, page_id)
    }

    pub fn snapshot_table(&self, name: &str) -> Option<Vec<u8>> {
        let table: &Table = self.tables.table(name)?;
        Some(snapshot::snapshot_table(&self.pool, name, table))
    }
}
