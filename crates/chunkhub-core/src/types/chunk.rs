//! Chunk metadata and upload session types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::result::AppResult;

/// Longest accepted `fileId`.
pub const MAX_FILE_ID_LEN: usize = 128;

/// Metadata describing one upload in progress, submitted with every chunk.
///
/// All chunks of one `file_id` must agree on `total_chunks`, `total_size`,
/// `originalname`, and `mimetype`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_chunk_position"))]
pub struct ChunkInfo {
    /// Client-chosen identifier grouping all chunks of one upload.
    #[validate(custom(function = "validate_file_id"))]
    pub file_id: String,
    /// Zero-based position of this chunk in the final file.
    pub chunk_index: u32,
    /// Number of chunks the final file is split into.
    #[validate(range(min = 1))]
    pub total_chunks: u32,
    /// Byte size of the reassembled file.
    pub total_size: u64,
    /// Original client-side file name.
    #[validate(length(min = 1, max = 255))]
    pub originalname: String,
    /// MIME type reported by the client.
    pub mimetype: String,
    /// Client-supplied checksum of the complete file. Stored, never verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl ChunkInfo {
    /// Name of the first session-level field on which `self` disagrees with
    /// the stored session metadata, if any.
    pub fn conflicting_field(&self, stored: &ChunkInfo) -> Option<&'static str> {
        if self.total_chunks != stored.total_chunks {
            Some("totalChunks")
        } else if self.total_size != stored.total_size {
            Some("totalSize")
        } else if self.originalname != stored.originalname {
            Some("originalname")
        } else if self.mimetype != stored.mimetype {
            Some("mimetype")
        } else {
            None
        }
    }
}

/// Acknowledgement returned after a chunk has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReceipt {
    /// Upload the chunk belongs to.
    pub file_id: String,
    /// Position that was written.
    pub chunk_index: u32,
    /// Payload size in bytes.
    pub size: u64,
}

/// An upload session found in the chunk working area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// Upload identifier (working area name).
    pub file_id: String,
    /// Latest metadata, if it could be read.
    pub info: Option<ChunkInfo>,
    /// Number of chunk payloads currently stored.
    pub stored_chunks: usize,
    /// Most recent modification time seen in the working area.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Whether `file_id` may be used as a working area name.
pub fn is_valid_file_id(file_id: &str) -> bool {
    !file_id.is_empty()
        && file_id.len() <= MAX_FILE_ID_LEN
        && file_id != "."
        && file_id != ".."
        && file_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Reject a `file_id` that cannot name a working area.
pub fn check_file_id(file_id: &str) -> AppResult<()> {
    if is_valid_file_id(file_id) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Invalid fileId '{file_id}': use 1-{MAX_FILE_ID_LEN} characters from [A-Za-z0-9._-]"
        )))
    }
}

fn validate_file_id(file_id: &str) -> Result<(), ValidationError> {
    if is_valid_file_id(file_id) {
        Ok(())
    } else {
        Err(ValidationError::new("file_id"))
    }
}

fn validate_chunk_position(info: &ChunkInfo) -> Result<(), ValidationError> {
    if info.chunk_index < info.total_chunks {
        Ok(())
    } else {
        Err(ValidationError::new("chunk_index_out_of_range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(index: u32) -> ChunkInfo {
        ChunkInfo {
            file_id: "abc".to_string(),
            chunk_index: index,
            total_chunks: 3,
            total_size: 6,
            originalname: "notes.txt".to_string(),
            mimetype: "text/plain".to_string(),
            md5: None,
        }
    }

    #[test]
    fn test_deserializes_camel_case() {
        let json = r#"{
            "fileId": "abc",
            "chunkIndex": 1,
            "totalChunks": 3,
            "totalSize": 6,
            "originalname": "notes.txt",
            "mimetype": "text/plain",
            "md5": "d41d8cd98f00b204e9800998ecf8427e"
        }"#;
        let parsed: ChunkInfo = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.chunk_index, 1);
        assert_eq!(parsed.md5.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[test]
    fn test_md5_is_optional() {
        let json = r#"{"fileId":"abc","chunkIndex":0,"totalChunks":1,"totalSize":2,"originalname":"a","mimetype":"b"}"#;
        let parsed: ChunkInfo = serde_json::from_str(json).unwrap();
        assert!(parsed.md5.is_none());
        assert!(!serde_json::to_string(&parsed).unwrap().contains("md5"));
    }

    #[test]
    fn test_validate_accepts_well_formed_chunk() {
        assert!(info(2).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_index_past_end() {
        assert!(info(3).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_total() {
        let mut bad = info(0);
        bad.total_chunks = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_file_id_rules() {
        assert!(is_valid_file_id("abc-123_x.y"));
        assert!(!is_valid_file_id(""));
        assert!(!is_valid_file_id(".."));
        assert!(!is_valid_file_id("../etc"));
        assert!(!is_valid_file_id("a/b"));
        assert!(!is_valid_file_id(&"x".repeat(MAX_FILE_ID_LEN + 1)));
        assert!(check_file_id("a b").is_err());
    }

    #[test]
    fn test_conflicting_field() {
        let stored = info(0);
        assert_eq!(info(1).conflicting_field(&stored), None);

        let mut other = info(1);
        other.total_size = 7;
        assert_eq!(other.conflicting_field(&stored), Some("totalSize"));

        let mut renamed = info(1);
        renamed.originalname = "other.txt".to_string();
        assert_eq!(renamed.conflicting_field(&stored), Some("originalname"));

        let mut hashed = info(1);
        hashed.md5 = Some("ff".to_string());
        assert_eq!(hashed.conflicting_field(&stored), None);
    }
}
