//! A fixed-capacity block store: a flat byte buffer carved into equally
//! sized blocks, with a packed bitmap tracking which block indices are in
//! use. This is the lowest layer of a simple filesystem — claiming,
//! releasing, reading, and writing raw fixed-size storage units. There is
//! no inode or directory layer and no multi-block file abstraction here.

mod alloc;
mod image;
mod store;

pub use crate::alloc::{Bitmap, State};
pub use crate::image::ImageError;
pub use crate::store::{
    BlockStore, Geometry, StoreError, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE,
};
