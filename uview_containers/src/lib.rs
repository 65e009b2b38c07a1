#![deny(missing_docs)]

//! # uview_containers
//!
//! Decoders for the on-disk containers Unreal games ship content in: the
//! legacy footer-indexed .pak format and the modern IoStore .utoc/.ucas pair.
//! Both produce a uniform [`ContainerIndex`] of [`ContainerEntry`] records,
//! which a [`stream::AssetStream`] turns into a seekable byte stream with
//! on-demand block decryption and decompression.

pub mod compression;
pub use compression::CompressionMethod;
pub mod encryption;
pub mod entry;
pub use entry::{ChunkInfo, CompressionBlock, ContainerEntry, ContainerIndex, EntryKind};
pub mod error;
pub use error::ContainerError;
pub mod iostore;
pub mod mount;
pub use mount::MountedContainer;
pub mod pak;
pub mod stream;
pub use stream::{AssetStream, BlockProvider, BufferPool};
