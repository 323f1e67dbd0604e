//! Rule-based sentence splitting.
//!
//! A boundary is a terminator run (`.`, `!`, `?`), optionally followed by
//! closing quotes or brackets, and then whitespace or end of input. There is
//! no abbreviation table, so "Dr. Smith" splits. Text without any terminator
//! comes back as a single sentence.

/// Split text into trimmed, non-empty sentences.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        if !is_terminator(ch) {
            continue;
        }
        // Swallow the rest of the terminator run and any closing marks.
        let mut end = index + ch.len_utf8();
        while let Some(&(next_index, next_ch)) = chars.peek() {
            if is_terminator(next_ch) || is_closer(next_ch) {
                end = next_index + next_ch.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let at_boundary = match chars.peek() {
            Some(&(_, next_ch)) => next_ch.is_whitespace(),
            None => true,
        };
        if at_boundary {
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }

    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn is_closer(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '\u{201d}' | '\u{2019}' | ')' | ']' | '}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminators_followed_by_whitespace() {
        let sentences = split_sentences("First point. Second point! Third point?");
        assert_eq!(
            sentences,
            vec!["First point.", "Second point!", "Third point?"]
        );
    }

    #[test]
    fn keeps_decimal_numbers_together() {
        let sentences = split_sentences("Pi is 3.14 roughly. Euler is 2.72.");
        assert_eq!(sentences, vec!["Pi is 3.14 roughly.", "Euler is 2.72."]);
    }

    #[test]
    fn attaches_closing_quotes_to_the_sentence() {
        let sentences = split_sentences("He said \"stop.\" Then he left.");
        assert_eq!(sentences, vec!["He said \"stop.\"", "Then he left."]);
    }

    #[test]
    fn swallows_terminator_runs() {
        let sentences = split_sentences("Wait... what?! Nothing.");
        assert_eq!(sentences, vec!["Wait...", "what?!", "Nothing."]);
    }

    #[test]
    fn text_without_terminators_is_one_sentence() {
        let sentences = split_sentences("a fragment with no ending");
        assert_eq!(sentences, vec!["a fragment with no ending"]);
    }

    #[test]
    fn line_wrapped_sentences_stay_whole() {
        let sentences = split_sentences("A sentence wrapped\nacross two lines. Next one.");
        assert_eq!(
            sentences,
            vec!["A sentence wrapped\nacross two lines.", "Next one."]
        );
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        assert!(split_sentences("  \n\t ").is_empty());
    }
}
