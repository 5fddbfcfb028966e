//! Local TF-IDF vectorizer.
//!
//! Tokens are lowercase runs of two or more word characters with English stop
//! words removed. IDF uses the smoothed form `ln((1 + n) / (1 + df)) + 1` and
//! every transformed vector is L2-normalized, so lexical cosine similarity of
//! two transformed reports is their dot product.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::vectors::SparseVector;

const TOKEN_PATTERN: &str = r"\b\w\w+\b";

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "don", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "you", "your", "yours", "yourself",
    "yourselves",
];

pub struct Tokenizer {
    pattern: Regex,
    stop_words: HashSet<&'static str>,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(TOKEN_PATTERN).context("failed to compile token pattern")?;
        Ok(Self {
            pattern,
            stop_words: STOP_WORDS.iter().copied().collect(),
        })
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|token| token.as_str())
            .filter(|token| !self.stop_words.contains(token))
            .map(ToOwned::to_owned)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfModel {
    pub vocabulary: BTreeMap<String, u32>,
    pub idf: Vec<f32>,
    pub doc_count: usize,
}

impl TfidfModel {
    pub fn fit<'a, I>(tokenizer: &Tokenizer, documents: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut document_frequency = BTreeMap::<String, usize>::new();
        let mut doc_count = 0usize;

        for document in documents {
            doc_count += 1;
            let unique = tokenizer.tokens(document).into_iter().collect::<HashSet<String>>();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let numerator = (1 + doc_count) as f64;
        let mut vocabulary = BTreeMap::<String, u32>::new();
        let mut idf = Vec::<f32>::with_capacity(document_frequency.len());
        for (index, (term, frequency)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term, index as u32);
            idf.push(((numerator / (1 + frequency) as f64).ln() + 1.0) as f32);
        }

        Self {
            vocabulary,
            idf,
            doc_count,
        }
    }

    pub fn dimension(&self) -> u32 {
        self.vocabulary.len() as u32
    }

    pub fn transform(&self, tokenizer: &Tokenizer, text: &str) -> SparseVector {
        let entries = tokenizer
            .tokens(text)
            .into_iter()
            .filter_map(|term| {
                let index = *self.vocabulary.get(&term)?;
                Some((index, self.idf[index as usize]))
            })
            .collect::<Vec<(u32, f32)>>();

        SparseVector::new(self.dimension(), entries).normalized()
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.doc_count as u64).to_le_bytes());
        for (term, index) in &self.vocabulary {
            hasher.update(term.as_bytes());
            hasher.update([0]);
            hasher.update(index.to_le_bytes());
            hasher.update(self.idf[*index as usize].to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}
