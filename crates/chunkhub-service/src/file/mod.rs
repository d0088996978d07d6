//! File services: chunked and single-request upload, merge, download.

pub mod download;
pub mod upload;

pub use download::{ByteRange, Download, DownloadService};
pub use upload::{SimpleUpload, UploadService};
