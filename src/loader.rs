//! Document loading and chunking.
//!
//! Turns a file or a directory tree into [`RawChunk`]s for
//! [`RagPipeline::ingest`](crate::pipeline::RagPipeline::ingest). Plain text
//! goes through `TextSplitter`, Markdown through `MarkdownSplitter`, both
//! sized in characters with the configured overlap. Directory entries are
//! visited in sorted order so repeated loads produce the same chunk order.
//! Files with other extensions are skipped; files that fail to read are
//! logged and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};
use tracing::{debug, info, warn};

use crate::config::ChunkingConfig;
use crate::error::RagError;
use crate::store::RawChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Markdown,
}

impl DocumentKind {
    /// Kind by extension (case-insensitive); `None` when unsupported.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Load and chunk every supported file under `path`.
///
/// `source` on each chunk is the file path as given/discovered.
pub fn load_documents(path: &Path, chunking: &ChunkingConfig) -> Result<Vec<RawChunk>, RagError> {
    let files = if path.is_dir() {
        let mut files = Vec::new();
        collect_files(path, &mut files)?;
        files
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        return Err(RagError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such file or directory: {}", path.display()),
        )));
    };

    let mut out = Vec::new();
    let mut loaded = 0usize;
    for file in &files {
        let Some(kind) = DocumentKind::from_path(file) else {
            debug!(path = %file.display(), "unsupported file type, skipped");
            continue;
        };
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "failed to read document, skipped");
                continue;
            }
        };
        let source = file.display().to_string();
        let chunks = split_text(&text, kind, chunking)?;
        debug!(path = %source, chunks = chunks.len(), "document chunked");
        out.extend(
            chunks
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| RawChunk::new(chunk, source.clone(), i)),
        );
        loaded += 1;
    }

    info!(path = %path.display(), documents = loaded, chunks = out.len(), "documents loaded");
    Ok(out)
}

/// Split one document's text into chunks.
pub fn split_text(text: &str, kind: DocumentKind, chunking: &ChunkingConfig) -> Result<Vec<String>, RagError> {
    let config = ChunkConfig::new(chunking.chunk_size)
        .with_overlap(chunking.chunk_overlap)
        .map_err(|e| RagError::Config(format!("chunking: {e}")))?;
    let chunks = match kind {
        DocumentKind::PlainText => TextSplitter::new(config).chunks(text).map(str::to_string).collect(),
        DocumentKind::Markdown => MarkdownSplitter::new(config).chunks(text).map(str::to_string).collect(),
    };
    Ok(chunks)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RagError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| match entry {
            Ok(e) => Some(e.path()),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable directory entry, skipped");
                None
            }
        })
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
