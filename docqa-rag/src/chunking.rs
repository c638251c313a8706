//! Document chunking.
//!
//! [`TextSplitter`] splits text on a separator and greedily packs the
//! resulting units into segments of at most `chunk_size` characters.
//! Consecutive segments share roughly `chunk_overlap` characters so that
//! context survives chunk boundaries.
//!
//! Segments are always literal slices of the input: the separator stays
//! attached to the unit it terminates, so the units concatenate back to the
//! original text and every segment can be mapped to a byte range with
//! [`TextSplitter::split_spans`].

use std::collections::VecDeque;
use std::iter::Peekable;
use std::ops::Range;

use crate::config::{RagConfig, validate_chunking};
use crate::error::Result;

/// Splits text into overlapping, size-bounded segments.
///
/// The size bound is soft: a single unit with no separator inside that is
/// longer than `chunk_size` is emitted whole rather than truncated.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::TextSplitter;
///
/// let splitter = TextSplitter::new(600, 200, "\n")?;
/// let chunks: Vec<&str> = splitter.split(&text).collect();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl TextSplitter {
    /// Create a new `TextSplitter`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` – maximum number of characters per segment
    /// * `chunk_overlap` – characters shared by consecutive segments
    /// * `separator` – split point; an empty separator splits into characters
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separator: impl Into<String>,
    ) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap, separator: separator.into() })
    }

    /// Create a splitter from the chunking fields of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap, config.separator.clone())
    }

    /// Maximum segment size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Target overlap between consecutive segments in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// The separator text is split on.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Lazily split `text` into segments.
    ///
    /// Each call returns a fresh iterator, so the same text can be split any
    /// number of times. Empty text yields nothing.
    pub fn split<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.split_spans(text).map(move |span| &text[span])
    }

    /// Lazily split `text`, yielding the byte range of each segment.
    pub fn split_spans<'a>(&'a self, text: &'a str) -> Spans<'a> {
        Spans {
            units: Units { text, separator: &self.separator, pos: 0 }.peekable(),
            window: VecDeque::new(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

/// A split unit: a byte range of the input and its length in characters.
#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    end: usize,
    chars: usize,
}

/// Iterator over separator-terminated units of a text.
#[derive(Debug)]
struct Units<'a> {
    text: &'a str,
    separator: &'a str,
    pos: usize,
}

impl Iterator for Units<'_> {
    type Item = Unit;

    fn next(&mut self) -> Option<Unit> {
        let rest = self.text.get(self.pos..).filter(|rest| !rest.is_empty())?;
        let len = if self.separator.is_empty() {
            rest.chars().next().map(char::len_utf8)?
        } else {
            match rest.find(self.separator) {
                Some(idx) => idx + self.separator.len(),
                None => rest.len(),
            }
        };

        let start = self.pos;
        self.pos += len;
        Some(Unit { start, end: self.pos, chars: rest[..len].chars().count() })
    }
}

/// Iterator over segment byte ranges, created by [`TextSplitter::split_spans`].
#[derive(Debug)]
pub struct Spans<'a> {
    units: Peekable<Units<'a>>,
    /// Units carried over from the previous segment as overlap.
    window: VecDeque<Unit>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Iterator for Spans<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        // Every segment takes at least one unit the previous one did not have.
        let first = self.units.next()?;

        let mut len: usize = self.window.iter().map(|u| u.chars).sum();
        while len + first.chars > self.chunk_size {
            match self.window.pop_front() {
                Some(dropped) => len -= dropped.chars,
                None => break,
            }
        }
        len += first.chars;
        self.window.push_back(first);

        while let Some(next) = self.units.peek().copied() {
            if len + next.chars > self.chunk_size {
                break;
            }
            len += next.chars;
            self.window.push_back(next);
            self.units.next();
        }

        let span = self.window.front()?.start..self.window.back()?.end;

        // Keep the longest suffix that fits in the overlap budget.
        let mut carried = 0;
        let mut keep = 0;
        for unit in self.window.iter().rev() {
            if carried + unit.chars > self.chunk_overlap {
                break;
            }
            carried += unit.chars;
            keep += 1;
        }
        let excess = self.window.len() - keep;
        self.window.drain(..excess);

        Some(span)
    }
}
