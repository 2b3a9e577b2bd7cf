use crate::alloc::{Bitmap, State};

use log::{debug, trace};
use thiserror::Error;

/// Legacy default layout: 256 blocks of 256 bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 256;
pub const DEFAULT_BLOCK_COUNT: usize = 256;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("block 0 is reserved and cannot be claimed")]
    Reserved,
    #[error("block {0} is out of range")]
    OutOfRange(usize),
    #[error("no free blocks available")]
    Exhausted,
    #[error("block {0} is already in use")]
    AlreadyInUse(usize),
    #[error("buffer holds {got} bytes but one block is {need} bytes")]
    BufferTooSmall { need: usize, got: usize },
}

/// The shape of a block store: how many blocks it holds and how large each
/// one is. The default matches the legacy fixed layout of 256 blocks of
/// 256 bytes; any other shape is validated once, at store construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Size of a single block in bytes.
    pub block_size: usize,
    /// Total number of blocks, including the reserved index 0.
    pub block_count: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
        }
    }
}

impl Geometry {
    pub(crate) fn validate(self) -> Result<Self, StoreError> {
        if self.block_size == 0 {
            return Err(StoreError::InvalidGeometry("block size must be nonzero"));
        }
        if self.block_count < 2 {
            return Err(StoreError::InvalidGeometry(
                "need at least one block besides the reserved index",
            ));
        }
        Ok(self)
    }
}

/// A flat byte buffer carved into fixed-size blocks, with a [`Bitmap`]
/// recording which block indices are in use.
///
/// Index 0 is reserved: automatic allocation never returns it and explicit
/// requests for it are refused, modeling the space a real on-disk free-block
/// map would occupy. The reservation is enforced at the API level; no bitmap
/// bit is pre-set for it.
///
/// Occupancy is advisory for raw I/O. [`read`](BlockStore::read) and
/// [`write`](BlockStore::write) move bytes for any in-bounds block whether
/// or not it is marked allocated; the bitmap only governs the allocation
/// operations. Callers needing cross-thread access must serialize it
/// externally, there is no internal locking.
pub struct BlockStore {
    geometry: Geometry,
    data: Vec<u8>,
    map: Bitmap,
}

impl BlockStore {
    /// Creates a store with the default 256 x 256-byte geometry, every
    /// block zeroed and free.
    pub fn new() -> Self {
        // The default geometry always validates.
        Self::with_geometry(Geometry::default()).unwrap()
    }

    /// Creates a store with the given geometry, every block zeroed and free.
    pub fn with_geometry(geometry: Geometry) -> Result<Self, StoreError> {
        let geometry = geometry.validate()?;
        // block_count >= 1 here, so the bitmap constructor cannot fail.
        let map = Bitmap::new(geometry.block_count)
            .ok_or(StoreError::InvalidGeometry("block count must be nonzero"))?;
        debug!(
            "creating block store: {} blocks x {} bytes",
            geometry.block_count, geometry.block_size
        );
        Ok(Self {
            geometry,
            data: vec![0; geometry.block_count * geometry.block_size],
            map,
        })
    }

    pub(crate) fn from_parts(geometry: Geometry, data: Vec<u8>, map: Bitmap) -> Self {
        debug_assert_eq!(data.len(), geometry.block_count * geometry.block_size);
        debug_assert_eq!(map.capacity(), geometry.block_count);
        Self {
            geometry,
            data,
            map,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub(crate) fn bitmap(&self) -> &Bitmap {
        &self.map
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    /// The highest block index a caller may claim; also the number of
    /// allocatable blocks, since index 0 is excluded.
    pub fn available_blocks(&self) -> usize {
        self.geometry.block_count - 1
    }

    /// Claims the lowest-indexed free block and returns its index.
    /// First-fit from index 1; index 0 is never handed out.
    ///
    /// Fails with [`StoreError::Exhausted`] when no claimable block is
    /// free, leaving the store unchanged.
    pub fn allocate(&mut self) -> Result<usize, StoreError> {
        let block = self
            .map
            .first_free_from(1)
            .filter(|&block| block < self.available_blocks())
            .ok_or(StoreError::Exhausted)?;
        self.map.set_used(block);
        trace!("allocated block {}", block);
        Ok(block)
    }

    /// Claims a specific block index chosen by the caller. This is the only
    /// path that validates a caller-chosen index: block 0 is refused as
    /// reserved, indices past [`available_blocks`](BlockStore::available_blocks)
    /// are out of range, and a block already marked in use stays untouched.
    pub fn request(&mut self, block: usize) -> Result<(), StoreError> {
        if block == 0 {
            return Err(StoreError::Reserved);
        }
        if block > self.available_blocks() {
            return Err(StoreError::OutOfRange(block));
        }
        if let State::Used = self.map.get(block) {
            return Err(StoreError::AlreadyInUse(block));
        }
        self.map.set_used(block);
        trace!("requested block {}", block);
        Ok(())
    }

    /// Marks a block free again. Out-of-range indices and already-free
    /// blocks are silently ignored; the block's bytes are left as they are.
    pub fn release(&mut self, block: usize) {
        if block <= self.available_blocks() {
            self.map.set_free(block);
            trace!("released block {}", block);
        }
    }

    /// The number of blocks currently marked in use.
    pub fn used_blocks(&self) -> usize {
        self.map.used_count()
    }

    /// The number of claimable blocks currently free.
    pub fn free_blocks(&self) -> usize {
        self.available_blocks() - self.map.used_count()
    }

    /// The fixed claimable capacity. A static fact of the geometry, not of
    /// allocation state.
    pub fn total_blocks(&self) -> usize {
        self.available_blocks()
    }

    /// Copies one full block into `buf` and returns the byte count moved.
    ///
    /// Block 0 is refused, but allocation state is not consulted: reading a
    /// block nobody claimed returns whatever bytes are present. The upper
    /// bound is the buffer's true extent (`block_count`), wider than the
    /// claimable range on purpose — see DESIGN.md on the read/write
    /// asymmetry. All checks run before any copy, so a failed read leaves
    /// `buf` untouched.
    pub fn read(&self, block: usize, buf: &mut [u8]) -> Result<usize, StoreError> {
        if block == 0 {
            return Err(StoreError::Reserved);
        }
        if block >= self.geometry.block_count {
            return Err(StoreError::OutOfRange(block));
        }
        let size = self.geometry.block_size;
        if buf.len() < size {
            return Err(StoreError::BufferTooSmall {
                need: size,
                got: buf.len(),
            });
        }
        let start = block * size;
        buf[0..size].copy_from_slice(&self.data[start..start + size]);
        Ok(size)
    }

    /// Copies one full block out of `buf` and returns the byte count moved.
    ///
    /// Unlike [`read`](BlockStore::read), block 0 is writable. Allocation
    /// state is not consulted here either.
    pub fn write(&mut self, block: usize, buf: &[u8]) -> Result<usize, StoreError> {
        if block >= self.geometry.block_count {
            return Err(StoreError::OutOfRange(block));
        }
        let size = self.geometry.block_size;
        if buf.len() < size {
            return Err(StoreError::BufferTooSmall {
                need: size,
                got: buf.len(),
            });
        }
        let start = block * size;
        self.data[start..start + size].copy_from_slice(&buf[0..size]);
        Ok(size)
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}
