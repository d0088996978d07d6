//! Finalized file records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest single path component most filesystems accept.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Extensions longer than this are not worth keeping when a name is cut.
const MAX_KEPT_EXTENSION_BYTES: usize = 16;

/// Metadata of a finished upload. Created once, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Server-generated unique name; the catalog key.
    pub filename: String,
    /// Original client-side file name.
    pub originalname: String,
    /// MIME type reported by the client.
    pub mimetype: String,
    /// Size in bytes.
    pub size: u64,
    /// Storage-relative path of the artifact.
    pub path: String,
    /// Client-supplied checksum hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// When the record was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Build the unique artifact name `{prefix}-{millis}-{name}`.
    ///
    /// The sanitized name is shortened so the result never exceeds
    /// [`MAX_FILENAME_BYTES`]; its extension survives the cut when short.
    pub fn generate_filename(prefix: &str, at: DateTime<Utc>, originalname: &str) -> String {
        let head = format!("{prefix}-{}-", at.timestamp_millis());
        let budget = MAX_FILENAME_BYTES.saturating_sub(head.len());
        format!("{head}{}", fit_name(&sanitize_name(originalname), budget))
    }
}

/// Shorten `name` to at most `budget` bytes without splitting a character.
fn fit_name(name: &str, budget: usize) -> String {
    if name.len() <= budget {
        return name.to_string();
    }

    if let Some(dot) = name.rfind('.')
        && dot > 0
        && name.len() - dot <= MAX_KEPT_EXTENSION_BYTES
        && name.len() - dot < budget
    {
        let (stem, extension) = name.split_at(dot);
        let stem = truncate_at_char(stem, budget - extension.len());
        return format!("{stem}{extension}");
    }

    truncate_at_char(name, budget).to_string()
}

fn truncate_at_char(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Make a client-supplied name safe to embed in a storage path.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "file".to_string(),
        _ => cleaned,
    }
}
