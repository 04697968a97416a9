//! NDJSON payload for the Hub commit endpoint.
//!
//! The body is one `header` line followed by one line per operation:
//!
//! ```text
//! {"key":"header","value":{"summary":"...","description":"..."}}
//! {"key":"file","value":{"content":"<base64>","path":"Dockerfile","encoding":"base64"}}
//! {"key":"lfsFile","value":{"path":"web/logo.png","algo":"sha256","oid":"<sha256>"}}
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOperation {
    /// Small file sent inline.
    Inline { path: String, content: Vec<u8> },
    /// File already uploaded to LFS storage, referenced by hash.
    Lfs { path: String, oid: String, size: u64 },
}

impl CommitOperation {
    pub fn path(&self) -> &str {
        match self {
            CommitOperation::Inline { path, .. } | CommitOperation::Lfs { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPayload {
    pub summary: String,
    pub description: String,
    pub operations: Vec<CommitOperation>,
}

impl CommitPayload {
    pub fn new(summary: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            operations: Vec::new(),
        }
    }

    pub fn push(&mut self, operation: CommitOperation) {
        self.operations.push(operation);
    }

    pub fn lfs_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, CommitOperation::Lfs { .. }))
            .count()
    }

    /// Render the request body.
    pub fn to_ndjson(&self) -> String {
        let mut lines = Vec::with_capacity(self.operations.len() + 1);
        lines.push(json!({
            "key": "header",
            "value": { "summary": self.summary, "description": self.description },
        }));
        for op in &self.operations {
            lines.push(match op {
                CommitOperation::Inline { path, content } => json!({
                    "key": "file",
                    "value": {
                        "content": STANDARD.encode(content),
                        "path": path,
                        "encoding": "base64",
                    },
                }),
                CommitOperation::Lfs { path, oid, .. } => json!({
                    "key": "lfsFile",
                    "value": { "path": path, "algo": "sha256", "oid": oid },
                }),
            });
        }

        let mut body = String::new();
        for line in lines {
            body.push_str(&line.to_string());
            body.push('\n');
        }
        body
    }
}
