//! Line-aware text splitting.
//!
//! Documents are cut into overlapping chunks of roughly `chunk_size`
//! characters before being handed to the search backend. Chunks end on line
//! boundaries unless a single line is itself longer than a chunk.

use crate::index::IndexError;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunk sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A span of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// First line (1-indexed)
    pub line_start: usize,
    /// Last line (1-indexed)
    pub line_end: usize,
}

/// Splits text into overlapping, line-aligned chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

/// A line, or a slice of an over-long line.
struct Piece<'a> {
    text: &'a str,
    chars: usize,
    line: usize,
}

impl TextSplitter {
    /// Create a splitter, rejecting a zero size or an overlap that would
    /// never advance.
    pub fn new(config: SplitterConfig) -> Result<Self, IndexError> {
        if config.chunk_size == 0 {
            return Err(IndexError::Splitter(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(IndexError::Splitter(
                "chunk overlap must be smaller than chunk size".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Split `text` into chunks. Whitespace-only chunks are dropped.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let pieces = self.pieces(text);
        let mut chunks = Vec::new();
        let mut i = 0;

        while i < pieces.len() {
            let start = i;
            let mut len = 0;
            while i < pieces.len() && (len == 0 || len + pieces[i].chars <= self.config.chunk_size)
            {
                len += pieces[i].chars;
                i += 1;
            }

            let body: String = pieces[start..i].iter().map(|p| p.text).collect();
            if !body.trim().is_empty() {
                chunks.push(TextChunk {
                    text: body,
                    line_start: pieces[start].line,
                    line_end: pieces[i - 1].line,
                });
            }

            if i >= pieces.len() {
                break;
            }

            // Step back over trailing pieces to form the overlap, always
            // leaving at least one piece behind so the window advances.
            let mut overlap = 0;
            let mut j = i;
            while j > start + 1 && overlap + pieces[j - 1].chars <= self.config.chunk_overlap {
                j -= 1;
                overlap += pieces[j].chars;
            }
            i = j;
        }

        chunks
    }

    fn pieces<'a>(&self, text: &'a str) -> Vec<Piece<'a>> {
        let mut pieces = Vec::new();
        for (idx, line) in text.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            let chars = line.chars().count();
            if chars <= self.config.chunk_size {
                pieces.push(Piece {
                    text: line,
                    chars,
                    line: line_no,
                });
                continue;
            }

            // Hard-split an over-long line on char boundaries
            let mut rest = line;
            while !rest.is_empty() {
                let cut = rest
                    .char_indices()
                    .nth(self.config.chunk_size)
                    .map(|(byte, _)| byte)
                    .unwrap_or(rest.len());
                let (head, tail) = rest.split_at(cut);
                pieces.push(Piece {
                    text: head,
                    chars: head.chars().count(),
                    line: line_no,
                });
                rest = tail;
            }
        }
        pieces
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            config: SplitterConfig::default(),
        }
    }
}
