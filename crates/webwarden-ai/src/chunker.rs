//! Word-boundary text chunking under a token budget.
//!
//! Text is split on whitespace and words are packed greedily into chunks
//! whose summed token cost stays within `max_tokens`. Words are never split:
//! a word that alone exceeds the budget becomes its own chunk and the model
//! call truncates it to its input window.

use std::str::SplitWhitespace;

/// Token cost of a word under the target model's vocabulary.
pub trait TokenCounter: Send + Sync {
    fn count(&self, word: &str) -> usize;
}

/// Counts every word as one token. For backends without a local tokenizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, _word: &str) -> usize {
        1
    }
}

/// Splits text into chunks that fit one inference call.
pub struct Chunker<'a> {
    counter: &'a dyn TokenCounter,
    max_tokens: usize,
}

impl<'a> Chunker<'a> {
    pub fn new(counter: &'a dyn TokenCounter, max_tokens: usize) -> Self {
        Self {
            counter,
            max_tokens,
        }
    }

    /// Lazily chunk `text` in a single pass. Whitespace-only text yields nothing.
    pub fn chunks<'t>(&self, text: &'t str) -> Chunks<'t>
    where
        'a: 't,
    {
        Chunks {
            words: text.split_whitespace(),
            counter: self.counter,
            max_tokens: self.max_tokens,
            carry: None,
        }
    }
}

/// Iterator over chunks, each the words of one chunk joined by single spaces.
pub struct Chunks<'t> {
    words: SplitWhitespace<'t>,
    counter: &'t dyn TokenCounter,
    max_tokens: usize,
    /// Word that overflowed the previous chunk, with its cost.
    carry: Option<(&'t str, usize)>,
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut chunk = String::new();
        let mut used = 0usize;

        if let Some((word, cost)) = self.carry.take() {
            chunk.push_str(word);
            used = cost;
        }

        for word in self.words.by_ref() {
            let cost = self.counter.count(word);
            if !chunk.is_empty() && used + cost > self.max_tokens {
                self.carry = Some((word, cost));
                return Some(chunk);
            }
            if !chunk.is_empty() {
                chunk.push(' ');
            }
            chunk.push_str(word);
            used += cost;
        }

        (!chunk.is_empty()).then_some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per started group of four characters, like a subword vocabulary.
    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, word: &str) -> usize {
            word.chars().count().div_ceil(4)
        }
    }

    fn chunk(text: &str, counter: &dyn TokenCounter, max: usize) -> Vec<String> {
        Chunker::new(counter, max).chunks(text).collect()
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(chunk("", &WordCounter, 10).is_empty());
        assert!(chunk(" \n\t  ", &WordCounter, 10).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        assert_eq!(chunk("hello   world\n", &WordCounter, 10), vec!["hello world"]);
    }

    #[test]
    fn splits_at_budget() {
        let chunks = chunk("a b c d e f g", &WordCounter, 3);
        assert_eq!(chunks, vec!["a b c", "d e f", "g"]);
    }

    #[test]
    fn exact_fit_not_split() {
        assert_eq!(chunk("a b c", &WordCounter, 3), vec!["a b c"]);
    }

    #[test]
    fn oversized_word_is_own_chunk() {
        // "internationalization" costs 5 tokens under CharCounter.
        let chunks = chunk("an internationalization ok", &CharCounter, 3);
        assert_eq!(chunks, vec!["an", "internationalization", "ok"]);
    }

    #[test]
    fn oversized_first_word_emits_no_empty_chunk() {
        let chunks = chunk("internationalization", &CharCounter, 2);
        assert_eq!(chunks, vec!["internationalization"]);
    }

    #[test]
    fn chunks_respect_budget_unless_single_word() {
        let text = "the quick brown fox jumps over the extraordinarily lazy dog again and again";
        for chunk in chunk(text, &CharCounter, 4) {
            let words: Vec<&str> = chunk.split(' ').collect();
            let cost: usize = words.iter().map(|w| CharCounter.count(w)).sum();
            assert!(cost <= 4 || words.len() == 1, "chunk {chunk:?} costs {cost}");
        }
    }

    #[test]
    fn joined_chunks_reproduce_words() {
        let text = "  Lorem ipsum\tdolor sit amet,\nconsectetur   adipiscing elit, sed do \
                    eiusmod tempor incididunt ut labore et dolore magna aliqua.  ";
        for max in [1, 2, 3, 5, 8, 400] {
            let chunks = chunk(text, &CharCounter, max);
            let normalized: Vec<&str> = text.split_whitespace().collect();
            assert_eq!(chunks.join(" "), normalized.join(" "), "max={max}");
            if max < 5 {
                assert!(chunks.len() >= 2);
            }
        }
    }

    #[test]
    fn iterator_is_lazy() {
        let counter = WordCounter;
        let chunker = Chunker::new(&counter, 1);
        let mut chunks = chunker.chunks("one two three");
        assert_eq!(chunks.next().as_deref(), Some("one"));
        assert_eq!(chunks.next().as_deref(), Some("two"));
        assert_eq!(chunks.next().as_deref(), Some("three"));
        assert_eq!(chunks.next(), None);
        assert_eq!(chunks.next(), None);
    }
}
