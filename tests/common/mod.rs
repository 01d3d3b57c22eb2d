//! Shared test helpers: a naive full-rewrite genome that serves as
//! ground truth for the edited store.

/// Plain-string genome applying every edit by rewriting the text.
/// Slow on purpose; its observable behavior defines correctness for
/// the indexed store.
#[derive(Debug, Clone)]
pub struct NaiveGenome {
    text: Vec<u8>,
}

impl NaiveGenome {
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        Self { text: text.into() }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn insert_at(&mut self, content: &[u8], position: usize) {
        assert!(position <= self.text.len(), "naive insert out of bounds");
        self.text.splice(position..position, content.iter().copied());
    }

    pub fn delete_at(&mut self, start: usize, length: usize) {
        assert!(start + length <= self.text.len(), "naive delete out of bounds");
        self.text.drain(start..start + length);
    }

    pub fn snp_at(&mut self, position: usize, replacement: &[u8]) {
        assert!(
            position + replacement.len() <= self.text.len(),
            "naive substitution out of bounds"
        );
        self.text[position..position + replacement.len()].copy_from_slice(replacement);
    }

    pub fn read(&self, start: usize, length: usize) -> Vec<u8> {
        self.text[start..start + length].to_vec()
    }

    /// Every start position of `pattern`, by exhaustive scan.
    pub fn find_all(&self, pattern: &[u8]) -> Vec<usize> {
        if pattern.is_empty() || pattern.len() > self.text.len() {
            return Vec::new();
        }
        (0..=self.text.len() - pattern.len())
            .filter(|&start| &self.text[start..start + pattern.len()] == pattern)
            .collect()
    }
}
