//! Upload data types shared by the storage, service, and API layers.

pub mod chunk;
pub mod record;

pub use chunk::{ChunkInfo, ChunkReceipt, UploadSession};
pub use record::FileRecord;
