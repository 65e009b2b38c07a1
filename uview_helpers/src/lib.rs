#![deny(missing_docs)]

//! Small helpers for reading Unreal data formats.

pub mod align;
pub use align::align16;
pub mod error;
pub mod guid;
pub use guid::Guid;
pub mod read_ext;
pub use read_ext::UnrealReadExt;
