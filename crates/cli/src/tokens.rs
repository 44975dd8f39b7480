use anyhow::Result;
use tiktoken_rs::CoreBPE;

pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

/// Exact counts with the `o200k_base` encoding.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn o200k_base() -> Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::o200k_base()?,
        })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Rough count at four characters per token.
#[derive(Debug, Default, Clone, Copy)]
pub struct EstimateCounter;

impl TokenCounter for EstimateCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// A patch is worth a task when it carries at least `threshold` tokens.
pub fn is_nontrivial(counter: &dyn TokenCounter, patch: &str, threshold: usize) -> bool {
    counter.count(patch) >= threshold
}
