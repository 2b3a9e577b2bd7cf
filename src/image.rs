//! Flat-file image format for a [`BlockStore`].
//!
//! The image captures the occupancy bitmap first and the block contents
//! after it, in index order, so a reader can recover the allocation state
//! before touching any data. This lives outside the allocator core; the
//! store itself never performs I/O.
//!
//! # Layout
//! ```text
//! =========================================================
//! | header (16 bytes) | bitmap bytes | blocks, index order |
//! =========================================================
//! ```
//! The header holds a magic string, a format version, and the geometry,
//! all multi-byte fields big-endian. The bitmap section is
//! `ceil(block_count / 8)` bytes; the data section is
//! `block_count * block_size` bytes.

use std::convert::TryFrom;
use std::io::{Read, Write};
use std::mem;

use byteorder::BigEndian;
use log::debug;
use thiserror::Error;
use zerocopy::byteorder::U32;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::alloc::{Bitmap, State};
use crate::store::{BlockStore, Geometry, StoreError};

const IMAGE_MAGIC: [u8; 4] = *b"BSIM";
const IMAGE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a block store image (bad magic)")]
    BadMagic,
    #[error("unsupported image version {0}")]
    UnsupportedVersion(u32),
    #[error("image geometry is unusable: {0}")]
    InvalidGeometry(#[from] StoreError),
    #[error("image bitmap is corrupt: {0}")]
    CorruptBitmap(&'static str),
}

#[repr(C)]
#[derive(AsBytes, FromBytes, Unaligned)]
struct ImageHeader {
    magic: [u8; 4],
    version: U32<BigEndian>,
    block_size: U32<BigEndian>,
    block_count: U32<BigEndian>,
}

impl ImageHeader {
    fn for_geometry(geometry: Geometry) -> Result<Self, ImageError> {
        let block_size = u32::try_from(geometry.block_size)
            .map_err(|_| StoreError::InvalidGeometry("block size exceeds the 32-bit image field"))?;
        let block_count = u32::try_from(geometry.block_count)
            .map_err(|_| StoreError::InvalidGeometry("block count exceeds the 32-bit image field"))?;
        Ok(Self {
            magic: IMAGE_MAGIC,
            version: U32::new(IMAGE_VERSION),
            block_size: U32::new(block_size),
            block_count: U32::new(block_count),
        })
    }
}

impl BlockStore {
    /// Writes the store as an image: header, bitmap, then every block in
    /// index order. Returns the total number of bytes written.
    pub fn dump_image<W: Write>(&self, mut writer: W) -> Result<usize, ImageError> {
        let header = ImageHeader::for_geometry(self.geometry())?;
        writer.write_all(header.as_bytes())?;
        writer.write_all(self.bitmap().as_bytes())?;
        writer.write_all(self.data())?;
        let written = mem::size_of::<ImageHeader>() + self.bitmap().as_bytes().len() + self.data().len();
        debug!("dumped block store image, {} bytes", written);
        Ok(written)
    }

    /// Reconstructs a store from an image produced by
    /// [`dump_image`](BlockStore::dump_image). The bitmap is recovered
    /// before the data section is read, so the returned store resumes
    /// allocation exactly where the dumped one left off.
    pub fn load_image<R: Read>(mut reader: R) -> Result<BlockStore, ImageError> {
        let mut header_buf = [0u8; mem::size_of::<ImageHeader>()];
        reader.read_exact(&mut header_buf)?;
        // The buffer length is exactly the header size, so the view always
        // verifies.
        let header_view = LayoutVerified::<_, ImageHeader>::new_unaligned(&header_buf[..])
            .expect("header buffer length equals header size");
        let header: &ImageHeader = &header_view;

        if header.magic != IMAGE_MAGIC {
            return Err(ImageError::BadMagic);
        }
        let version = header.version.get();
        if version != IMAGE_VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }

        let geometry = Geometry {
            block_size: header.block_size.get() as usize,
            block_count: header.block_count.get() as usize,
        }
        .validate()?;
        let data_len = geometry
            .block_count
            .checked_mul(geometry.block_size)
            .ok_or(StoreError::InvalidGeometry("image dimensions overflow"))?;

        let mut bitmap_buf = vec![0u8; (geometry.block_count + 7) / 8];
        reader.read_exact(&mut bitmap_buf)?;
        let map = Bitmap::from_bytes(&bitmap_buf, geometry.block_count)
            .ok_or(StoreError::InvalidGeometry("bitmap section is short"))?;
        // Block 0 is never claimable through the store's API, so a recovered
        // bitmap marking it used can only come from a corrupted image. It
        // would also break the free-block accounting.
        if let State::Used = map.get(0) {
            return Err(ImageError::CorruptBitmap("reserved block 0 marked used"));
        }

        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data)?;

        debug!(
            "loaded block store image: {} blocks x {} bytes, {} in use",
            geometry.block_count,
            geometry.block_size,
            map.used_count()
        );
        Ok(BlockStore::from_parts(geometry, data, map))
    }
}
