use super::types::{Chunk, Document, DocumentMetadata};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Prefer to end chunks on paragraph, line, sentence or word boundaries.
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            sentence_aware: true,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns a description of the problem if the chunk size is zero or the
    /// overlap is not smaller than the chunk size.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Lazily split a document. Each call starts from the beginning of the text.
    #[must_use]
    pub fn chunks<'a>(&'a self, document: &'a Document) -> Chunks<'a> {
        Chunks {
            text: &document.content,
            metadata: &document.metadata,
            config: &self.config,
            byte_pos: 0,
            char_pos: 0,
            index: 0,
        }
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.chunks(document).collect()
    }
}

/// Iterator over the chunks of one document. See [`TextSplitter::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    metadata: &'a DocumentMetadata,
    config: &'a SplitterConfig,
    byte_pos: usize,
    char_pos: usize,
    index: usize,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let text = self.text;
        let rest = &text[self.byte_pos..];
        if rest.is_empty() {
            return None;
        }
        let size = self.config.chunk_size.max(1);
        let window: Vec<(usize, char)> = rest.char_indices().take(size + 1).collect();

        let chunk = |len_bytes: usize, index: usize, start: usize| Chunk {
            content: rest[..len_bytes].to_owned(),
            metadata: self.metadata.clone(),
            chunk_index: index,
            start,
        };

        if window.len() <= size {
            let last = chunk(rest.len(), self.index, self.char_pos);
            self.byte_pos = text.len();
            self.index += 1;
            return Some(last);
        }

        let len = if self.config.sentence_aware {
            break_point(&window, size)
        } else {
            size
        };
        let out = chunk(window[len].0, self.index, self.char_pos);

        let mut advance = len - self.config.chunk_overlap.min(len - 1);
        if self.config.sentence_aware
            && let Some(ws) = window[advance..len]
                .iter()
                .position(|(_, c)| c.is_whitespace())
            && advance + ws + 1 < len
        {
            advance += ws + 1;
        }

        self.byte_pos += window[advance].0;
        self.char_pos += advance;
        self.index += 1;
        Some(out)
    }
}

/// Pick the chunk length in chars, searching the second half of the window for
/// the last paragraph break, then line break, sentence end and whitespace.
fn break_point(window: &[(usize, char)], size: usize) -> usize {
    let ch = |i: usize| window[i].1;
    let min = size / 2 + 1;
    let last = |pred: &dyn Fn(usize) -> bool| (min..=size).rev().find(|&e| pred(e));

    last(&|e| e >= 2 && ch(e - 1) == '\n' && ch(e - 2) == '\n')
        .or_else(|| last(&|e| ch(e - 1) == '\n'))
        .or_else(|| {
            last(&|e| e >= 2 && ch(e - 1).is_whitespace() && matches!(ch(e - 2), '.' | '?' | '!'))
        })
        .or_else(|| last(&|e| ch(e - 1).is_whitespace()))
        .unwrap_or(size)
}

/// Rebuild the original text from consecutive chunks of one document by
/// dropping the part of each chunk already covered by its predecessors.
#[must_use]
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start);
        out.extend(chunk.content.chars().skip(skip));
        covered = covered.max(chunk.start + chunk.char_len());
    }
    out
}
