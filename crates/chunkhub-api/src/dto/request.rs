//! Request DTOs with validation.

use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use validator::Validate;

use chunkhub_core::error::AppError;
use chunkhub_core::result::AppResult;
use chunkhub_core::types::chunk::ChunkInfo;

/// MIME type used when neither the form nor the file part names one.
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Merge request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Upload to merge.
    #[validate(length(min = 1, message = "fileId is required"))]
    pub file_id: String,
}

/// Chunk metadata sent as query parameters with a raw-body chunk upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkQuery {
    /// Number of chunks the file is split into.
    pub total_chunks: u32,
    /// Size of the reassembled file.
    pub total_size: u64,
    /// Original file name.
    pub originalname: String,
    /// MIME type.
    pub mimetype: Option<String>,
    /// Checksum hint.
    pub md5: Option<String>,
}

impl ChunkQuery {
    /// Combine with the path parameters into full chunk metadata.
    pub fn into_chunk_info(self, file_id: String, chunk_index: u32) -> ChunkInfo {
        ChunkInfo {
            file_id,
            chunk_index,
            total_chunks: self.total_chunks,
            total_size: self.total_size,
            originalname: self.originalname,
            mimetype: self
                .mimetype
                .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string()),
            md5: self.md5,
        }
    }
}

/// Fields collected from a multipart chunk upload.
#[derive(Debug, Default)]
pub struct ChunkUploadForm {
    file_id: Option<String>,
    chunk_index: Option<String>,
    total_chunks: Option<String>,
    total_size: Option<String>,
    originalname: Option<String>,
    mimetype: Option<String>,
    md5: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    data: Option<Bytes>,
}

impl ChunkUploadForm {
    /// Record a text field. Returns `false` for names the form does not use.
    pub fn set_text(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "fileId" => &mut self.file_id,
            "chunkIndex" => &mut self.chunk_index,
            "totalChunks" => &mut self.total_chunks,
            "totalSize" => &mut self.total_size,
            "originalname" => &mut self.originalname,
            "mimetype" => &mut self.mimetype,
            "md5" => &mut self.md5,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Record the chunk payload part.
    pub fn set_file(&mut self, file_name: Option<String>, content_type: Option<String>, data: Bytes) {
        self.file_name = file_name;
        self.file_type = content_type;
        self.data = Some(data);
    }

    /// Validate presence and syntax of every field.
    ///
    /// `originalname` and `mimetype` fall back to the file part's name and
    /// content type.
    pub fn into_parts(self) -> AppResult<(ChunkInfo, Bytes)> {
        let data = self
            .data
            .ok_or_else(|| AppError::validation("file is required"))?;

        let info = ChunkInfo {
            file_id: self
                .file_id
                .ok_or_else(|| AppError::validation("fileId is required"))?,
            chunk_index: parse_number(self.chunk_index, "chunkIndex")?,
            total_chunks: parse_number(self.total_chunks, "totalChunks")?,
            total_size: parse_number(self.total_size, "totalSize")?,
            originalname: self
                .originalname
                .or(self.file_name)
                .ok_or_else(|| AppError::validation("originalname is required"))?,
            mimetype: self
                .mimetype
                .or(self.file_type)
                .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string()),
            md5: self.md5.filter(|m| !m.is_empty()),
        };

        Ok((info, data))
    }
}

fn parse_number<T: FromStr>(value: Option<String>, field: &str) -> AppResult<T> {
    let raw = value.ok_or_else(|| AppError::validation(format!("{field} is required")))?;
    raw.trim()
        .parse()
        .map_err(|_| AppError::validation(format!("{field} must be a non-negative integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkhub_core::error::ErrorKind;

    fn filled() -> ChunkUploadForm {
        let mut form = ChunkUploadForm::default();
        for (name, value) in [
            ("fileId", "abc"),
            ("chunkIndex", "1"),
            ("totalChunks", "3"),
            ("totalSize", "6"),
        ] {
            assert!(form.set_text(name, value.to_string()));
        }
        form.set_file(
            Some("notes.txt".to_string()),
            Some("text/plain".to_string()),
            Bytes::from("BB"),
        );
        form
    }

    #[test]
    fn test_form_falls_back_to_file_part() {
        let (info, data) = filled().into_parts().unwrap();
        assert_eq!(info.file_id, "abc");
        assert_eq!(info.chunk_index, 1);
        assert_eq!(info.total_size, 6);
        assert_eq!(info.originalname, "notes.txt");
        assert_eq!(info.mimetype, "text/plain");
        assert!(info.md5.is_none());
        assert_eq!(data, "BB");
    }

    #[test]
    fn test_form_text_fields_win() {
        let mut form = filled();
        form.set_text("originalname", "real.txt".to_string());
        form.set_text("md5", "ff".to_string());
        let (info, _) = form.into_parts().unwrap();
        assert_eq!(info.originalname, "real.txt");
        assert_eq!(info.md5.as_deref(), Some("ff"));
    }

    #[test]
    fn test_form_rejects_bad_numbers() {
        let mut form = filled();
        form.set_text("chunkIndex", "-1".to_string());
        let err = form.into_parts().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("chunkIndex"));
    }

    #[test]
    fn test_form_requires_file() {
        let mut form = ChunkUploadForm::default();
        form.set_text("fileId", "abc".to_string());
        assert!(!form.set_text("unknown", "x".to_string()));
        let err = form.into_parts().unwrap_err();
        assert_eq!(err.message, "file is required");
    }

    #[test]
    fn test_query_defaults_mimetype() {
        let query: ChunkQuery =
            serde_json::from_str(r#"{"totalChunks":2,"totalSize":4,"originalname":"a.bin"}"#)
                .unwrap();
        let info = query.into_chunk_info("id".to_string(), 0);
        assert_eq!(info.mimetype, FALLBACK_MIME_TYPE);
        assert_eq!(info.total_chunks, 2);
    }
}
