use tracing::warn;

use crate::error::StorageError;
use crate::page::HEADER_SIZE;

/// Immutable, validated-once engine configuration. `page_size` defines the
/// arithmetic of every other structure; it cannot change after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub page_size: u32,
    pub pool_size: u32,
    pub disk_capacity: u32,
    pub overflow_threshold: u32,
}

/// Every page needs room for at least the shared 16-byte header before
/// `SlottedPage::init` can write it; below this, header writes would run
/// off the end of the page. Not otherwise a spec-mandated floor.
pub const MIN_PAGE_SIZE: u32 = HEADER_SIZE as u32;

impl EngineConfig {
    pub fn validate(self) -> Result<Self, StorageError> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(StorageError::InvalidConfig(format!(
                "page_size must be >= {MIN_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.pool_size == 0 {
            return Err(StorageError::InvalidConfig(
                "pool_size must be positive".into(),
            ));
        }
        if self.disk_capacity == 0 {
            return Err(StorageError::InvalidConfig(
                "disk_capacity must be positive".into(),
            ));
        }
        if self.overflow_threshold == 0 {
            return Err(StorageError::InvalidConfig(
                "overflow_threshold must be positive".into(),
            ));
        }
        if self.overflow_threshold > self.page_size {
            return Err(StorageError::InvalidConfig(format!(
                "overflow_threshold ({}) must not exceed page_size ({})",
                self.overflow_threshold, self.page_size
            )));
        }

        // Permitted but degenerate: a pool bigger than the disk it backs.
        if self.pool_size > self.disk_capacity {
            warn!(
                pool_size = self.pool_size,
                disk_capacity = self.disk_capacity,
                "pool_size exceeds disk_capacity; frames will sit empty"
            );
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EngineConfig {
        EngineConfig {
            page_size: 128,
            pool_size: 4,
            disk_capacity: 16,
            overflow_threshold: 64,
        }
    }

    #[test]
    fn accepts_a_sane_configuration() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_page_size_below_minimum() {
        let cfg = EngineConfig {
            page_size: 8,
            ..base()
        };
        assert!(matches!(
            cfg.validate(),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    #[test]
    fn accepts_a_small_page_size_with_no_other_floor() {
        // Below the "typically >= 64" descriptive range but still a
        // structurally valid page: positive, overflow_threshold <= page_size.
        let cfg = EngineConfig {
            page_size: 32,
            pool_size: 1,
            disk_capacity: 1,
            overflow_threshold: 16,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_overflow_threshold_above_page_size() {
        let cfg = EngineConfig {
            overflow_threshold: 9999,
            ..base()
        };
        assert!(matches!(
            cfg.validate(),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    #[test]
    fn permits_pool_larger_than_disk_but_warns() {
        let cfg = EngineConfig {
            pool_size: 32,
            disk_capacity: 16,
            ..base()
        };
        assert!(cfg.validate().is_ok());
    }
}
