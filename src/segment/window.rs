//! Token counting and sliding-window assembly.

use std::sync::Arc;

use anyhow::Error as TokenizerError;
use tiktoken_rs::{CoreBPE, cl100k_base, o200k_base, p50k_base, p50k_edit, r50k_base};

pub(crate) type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Build a token counter for the named encoding.
///
/// Unknown names warn and fall back to `cl100k_base`; if that in turn fails
/// to load, the counter degrades to whitespace tokens so segmentation keeps
/// flowing.
pub(crate) fn build_token_counter(encoding: Option<&str>) -> TokenCounter {
    let name = encoding
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("cl100k_base");
    let resolved = match encoding_from_name(name) {
        Some(result) => result,
        None => {
            tracing::warn!(encoding = name, "Unknown tokenizer encoding; using 'cl100k_base'");
            cl100k_base()
        }
    };
    match resolved {
        Ok(encoding) => {
            let encoding = Arc::new(encoding);
            Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len())
        }
        Err(error) => {
            tracing::warn!(
                error = %error,
                "Tokenizer unavailable; falling back to whitespace counting"
            );
            whitespace_token_counter()
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

pub(crate) fn whitespace_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Pack sentences into windows under `token_limit`, re-seeding each new
/// window with the previous window's trailing sentences.
///
/// The budget is a packing bound, not a truncation rule: a single sentence
/// over the limit becomes its own window. The re-seeded overlap shrinks from
/// the front when it would push the next window past the budget.
pub(crate) fn assemble_windows(
    sentences: &[String],
    token_limit: usize,
    overlap_sentences: usize,
    counter: &TokenCounter,
) -> Vec<String> {
    let mut windows = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for sentence in sentences {
        let sentence_tokens = counter.as_ref()(sentence);
        if current_tokens + sentence_tokens > token_limit && !current.is_empty() {
            windows.push(current.join(" "));
            let keep_from = current.len().saturating_sub(overlap_sentences);
            current.drain(..keep_from);
            current_tokens = current.iter().map(|kept| counter.as_ref()(kept)).sum();
            while !current.is_empty() && current_tokens + sentence_tokens > token_limit {
                let dropped = current.remove(0);
                current_tokens = current_tokens.saturating_sub(counter.as_ref()(dropped));
            }
        }
        current.push(sentence);
        current_tokens += sentence_tokens;
    }

    if !current.is_empty() {
        windows.push(current.join(" "));
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn packs_sentences_up_to_the_token_limit() {
        let input = sentences(&["one two.", "three four.", "five six."]);
        let counter = whitespace_token_counter();
        let windows = assemble_windows(&input, 4, 0, &counter);
        assert_eq!(windows, vec!["one two. three four.", "five six."]);
    }

    #[test]
    fn seeds_next_window_with_trailing_sentences() {
        let input = sentences(&["a one.", "b two.", "c three.", "d four."]);
        let counter = whitespace_token_counter();
        let windows = assemble_windows(&input, 4, 1, &counter);
        assert_eq!(
            windows,
            vec!["a one. b two.", "b two. c three.", "c three. d four."]
        );
    }

    #[test]
    fn oversized_sentence_becomes_its_own_window() {
        let input = sentences(&[
            "tiny.",
            "this sentence alone blows straight past the budget.",
            "tail.",
        ]);
        let counter = whitespace_token_counter();
        let windows = assemble_windows(&input, 3, 1, &counter);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], "tiny.");
        assert!(windows[1].starts_with("this sentence"));
        assert_eq!(windows[2], "tail.");
    }

    #[test]
    fn overlap_is_trimmed_when_it_crowds_out_the_next_sentence() {
        let input = sentences(&["a one.", "b two.", "c three.", "d four."]);
        let counter = whitespace_token_counter();
        let windows = assemble_windows(&input, 4, 2, &counter);
        for window in &windows {
            assert!(counter.as_ref()(window) <= 4);
        }
    }

    #[test]
    fn empty_sentence_list_yields_no_windows() {
        let counter = whitespace_token_counter();
        assert!(assemble_windows(&[], 4, 2, &counter).is_empty());
    }

    #[test]
    fn unknown_encoding_falls_back_to_default() {
        let counter = build_token_counter(Some("not-a-real-encoding"));
        assert!(counter.as_ref()("some words here") > 0);
    }

    #[test]
    fn tiktoken_counter_bounds_window_tokens() {
        let counter = build_token_counter(Some("cl100k_base"));
        let input = sentences(&[
            "The quick brown fox jumps over the lazy dog.",
            "A second sentence follows here.",
            "And a third one closes it.",
        ]);
        let windows = assemble_windows(&input, 12, 1, &counter);
        assert!(!windows.is_empty());
        for window in &windows {
            assert!(counter.as_ref()(window) <= 12);
        }
    }
}
