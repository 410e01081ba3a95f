//! Overlapping document chunking. Prefers paragraph boundaries, falls back
//! to sentence boundaries, hard-splits only when a single sentence exceeds
//! the target size. Deterministic: the same document always yields the same
//! chunks.

use crate::types::{Chunk, Document};

pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

/// A splittable unit: a paragraph, or a sentence carved out of an oversize
/// paragraph. `starts_paragraph` controls the joining separator so packed
/// segments read like the original text.
struct Piece {
    text: String,
    starts_paragraph: bool,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        debug_assert!(overlap < chunk_size);
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Split a document into overlapping chunks with contiguous ordinals
    /// starting at 0. Every chunk is non-empty; documents with an empty body
    /// fall back to the excerpt, then the title, so each indexed document
    /// produces at least one embeddable chunk.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let source = if !doc.body.trim().is_empty() {
            doc.body.as_str()
        } else if !doc.excerpt.trim().is_empty() {
            doc.excerpt.as_str()
        } else {
            doc.title.as_str()
        };

        self.segments(source)
            .into_iter()
            .enumerate()
            .scan(None::<String>, |prev, (ordinal, segment)| {
                let text = match prev.as_deref() {
                    Some(previous) if self.overlap > 0 => {
                        let tail = overlap_tail(previous, self.overlap);
                        if tail.is_empty() {
                            segment.clone()
                        } else {
                            format!("{} {}", tail, segment)
                        }
                    }
                    _ => segment.clone(),
                };
                *prev = Some(segment);
                Some(Chunk::new(&doc.id, ordinal, text))
            })
            .collect()
    }

    /// Pre-overlap segments, each at most `chunk_size` characters.
    /// Concatenating them reproduces the source up to whitespace
    /// normalization.
    fn segments(&self, text: &str) -> Vec<String> {
        let pieces = self.pieces(text);
        let mut segments = Vec::new();
        let mut current = String::new();

        for piece in pieces {
            let sep = if current.is_empty() {
                ""
            } else if piece.starts_paragraph {
                "\n\n"
            } else {
                " "
            };
            if !current.is_empty()
                && current.chars().count() + sep.len() + piece.text.chars().count()
                    > self.chunk_size
            {
                segments.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str(sep);
            }
            current.push_str(&piece.text);
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }

    fn pieces(&self, text: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if paragraph.chars().count() <= self.chunk_size {
                pieces.push(Piece {
                    text: paragraph.to_string(),
                    starts_paragraph: true,
                });
                continue;
            }
            // Oversize paragraph: split on sentence ends, hard-split any
            // sentence that still exceeds the target.
            let mut first = true;
            for sentence in split_sentences(paragraph) {
                if sentence.chars().count() <= self.chunk_size {
                    pieces.push(Piece {
                        text: sentence,
                        starts_paragraph: first,
                    });
                    first = false;
                } else {
                    for (i, part) in hard_split(&sentence, self.chunk_size).into_iter().enumerate()
                    {
                        pieces.push(Piece {
                            text: part,
                            starts_paragraph: first && i == 0,
                        });
                    }
                    first = false;
                }
            }
        }
        pieces
    }
}

/// Split a paragraph into sentences, keeping terminators attached.
fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = paragraph.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().map_or(true, |next| next.is_whitespace()) {
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
                // Consume the separating whitespace.
                while chars.peek().map_or(false, |next| next.is_whitespace()) {
                    chars.next();
                }
            }
        }
    }
    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Fixed-width split at char boundaries for pathological run-on text.
fn hard_split(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .map(|c| c.iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Last `overlap` characters of the previous segment, trimmed forward to a
/// word boundary so chunks never start mid-word.
fn overlap_tail(previous: &str, overlap: usize) -> String {
    let chars: Vec<char> = previous.chars().collect();
    if chars.len() <= overlap {
        return previous.trim().to_string();
    }
    let tail: String = chars[chars.len() - overlap..].iter().collect();
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim().to_string(),
        None => tail.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document {
            id: "d1".into(),
            title: "Title".into(),
            body: body.into(),
            excerpt: String::new(),
            content_type: "post".into(),
            url: String::new(),
            published_at: None,
            author: String::new(),
            categories: vec![],
            tags: vec![],
            featured_image: None,
            word_count: 0,
        }
    }

    fn normalize_ws(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk_document(&doc("A short body."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "d1#0");
        assert_eq!(chunks[0].text, "A short body.");
    }

    #[test]
    fn ordinals_are_contiguous_and_chunks_nonempty() {
        let paragraph = "Lorem ipsum dolor sit amet consectetur. ".repeat(12);
        let body = format!("{}\n\n{}\n\n{}", paragraph, paragraph, paragraph);
        let chunker = Chunker::new(400, 80);
        let chunks = chunker.chunk_document(&doc(&body));
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert!(!chunk.text.trim().is_empty());
        }
    }

    #[test]
    fn pre_overlap_segments_reproduce_body() {
        let body = "First paragraph here. It has two sentences.\n\n\
                    Second paragraph follows with more words in it.\n\n\
                    Third one closes the document.";
        let chunker = Chunker::new(60, 10);
        let segments = chunker.segments(body);
        let reassembled = segments.join(" ");
        assert_eq!(normalize_ws(&reassembled), normalize_ws(body));
    }

    #[test]
    fn oversize_sentence_is_hard_split() {
        let body = "x".repeat(2500);
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk_document(&doc(&body));
        assert!(chunks.len() >= 3);
        assert!(chunks
            .iter()
            .all(|c| c.text.chars().count() <= 1000 + 200 + 1));
    }

    #[test]
    fn later_chunks_carry_overlap_from_previous() {
        let sentence = "Every good sentence ends with a period. ";
        let body = sentence.repeat(60);
        let chunker = Chunker::new(500, 100);
        let chunks = chunker.chunk_document(&doc(&body));
        assert!(chunks.len() > 1);
        // The second chunk starts with text already present at the end of
        // the first chunk's source segment.
        assert!(chunks[1].text.starts_with("Every") || chunks[1].text.contains("period"));
    }

    #[test]
    fn empty_body_falls_back_to_title() {
        let mut d = doc("");
        d.excerpt = String::new();
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk_document(&d);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Title");
    }

    #[test]
    fn chunking_is_deterministic() {
        let body = "Alpha beta gamma. ".repeat(100);
        let chunker = Chunker::new(300, 60);
        let a = chunker.chunk_document(&doc(&body));
        let b = chunker.chunk_document(&doc(&body));
        let texts_a: Vec<_> = a.iter().map(|c| &c.text).collect();
        let texts_b: Vec<_> = b.iter().map(|c| &c.text).collect();
        assert_eq!(texts_a, texts_b);
    }
}
