//! Post-processing of raw model output into the answer shown to users.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Plain answer, leading boilerplate removed.
    Plain,
    /// Reasoning extracted from `<think>` blocks, emphasis markers removed.
    Reasoning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedAnswer {
    pub answer: String,
    pub reasoning: Option<String>,
}

// Applied in order, each once, anchored at the start of the text.
static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(according to the (document|pdf|text|content)|the (document|pdf|text) (states|mentions|says|indicates|shows|provides|contains|notes)|based on the (document|pdf|text|content)|from the (document|pdf|text)|in the (document|pdf|text))\b",
        r"(?i)^(i can see that|i found that|i notice that|i observe that|i found in the document)\b",
        r"(?i)^(to answer your question|regarding your question|in response to your question)\b",
        r"(?i)^(here is|here's|the answer is|the information is)\b",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static LEADING_PUNCTUATION: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[:.,\-\s]+").ok());

static THINK_BLOCK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)<think>(.*?)</think>").ok());

const CLOSE_THINK: &str = "</think>";

/// Cleans a raw completion. Never fails; worst case the input comes back trimmed.
pub fn sanitize(raw: &str, mode: AnswerMode) -> SanitizedAnswer {
    match mode {
        AnswerMode::Plain => SanitizedAnswer {
            answer: strip_boilerplate(raw),
            reasoning: None,
        },
        AnswerMode::Reasoning => {
            let (answer, reasoning) = split_reasoning(raw);
            SanitizedAnswer {
                answer: strip_boilerplate(&answer.replace("**", "")),
                reasoning,
            }
        }
    }
}

fn split_reasoning(raw: &str) -> (String, Option<String>) {
    let Some(think) = THINK_BLOCK.as_ref() else {
        return (raw.to_string(), None);
    };

    let mut blocks = Vec::new();
    for captures in think.captures_iter(raw) {
        if let Some(inner) = captures.get(1) {
            let inner = inner.as_str().trim();
            if !inner.is_empty() {
                blocks.push(inner.to_string());
            }
        }
    }
    let mut answer = think.replace_all(raw, "").into_owned();

    // Some models omit the opening tag and only emit the closing one.
    if !answer.contains("<think>") {
        if let Some(pos) = answer.find(CLOSE_THINK) {
            let inner = answer[..pos].trim();
            if !inner.is_empty() {
                blocks.push(inner.to_string());
            }
            answer = answer[pos + CLOSE_THINK.len()..].to_string();
        }
    }

    let reasoning = if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    };
    (answer, reasoning)
}

fn strip_boilerplate(text: &str) -> String {
    let mut out = text.trim().to_string();
    for pattern in BOILERPLATE.iter() {
        out = pattern.replace(&out, "").into_owned();
    }

    let trimmed = out.trim();
    let stripped = match LEADING_PUNCTUATION.as_ref() {
        Some(re) => re.replace(trimmed, ""),
        None => trimmed.into(),
    };
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_is_split_out() {
        let out = sanitize("<think>because X</think>The answer is 42.", AnswerMode::Reasoning);
        assert_eq!(out.answer, "42.");
        assert_eq!(out.reasoning.as_deref(), Some("because X"));
    }

    #[test]
    fn test_bold_lead_in_is_stripped() {
        let out = sanitize("<think>t</think>**The answer is** 42.", AnswerMode::Reasoning);
        assert_eq!(out.answer, "42.");
        assert_eq!(sanitize(&out.answer, AnswerMode::Reasoning).answer, "42.");
    }

    #[test]
    fn test_reasoning_mode_without_think_block() {
        let out = sanitize("Revenue was **$5M** in Q3.", AnswerMode::Reasoning);
        assert_eq!(out.answer, "Revenue was $5M in Q3.");
        assert_eq!(out.reasoning, None);
    }

    #[test]
    fn test_multiple_think_blocks_are_joined() {
        let raw = "<think>\n first \n</think>Paris<think>second</think>";
        let out = sanitize(raw, AnswerMode::Reasoning);
        assert_eq!(out.answer, "Paris");
        assert_eq!(out.reasoning.as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn test_dangling_close_tag() {
        let out = sanitize("weighing the options</think>\n\nBlue.", AnswerMode::Reasoning);
        assert_eq!(out.answer, "Blue.");
        assert_eq!(out.reasoning.as_deref(), Some("weighing the options"));
    }

    #[test]
    fn test_plain_strips_leading_phrase() {
        let out = sanitize("According to the document, revenue grew 5%.", AnswerMode::Plain);
        assert_eq!(out.answer, "revenue grew 5%.");
        assert_eq!(out.reasoning, None);

        let out = sanitize("  Here's: the total is 12", AnswerMode::Plain);
        assert_eq!(out.answer, "the total is 12");

        let out = sanitize("The PDF states - two parts.", AnswerMode::Plain);
        assert_eq!(out.answer, "two parts.");
    }

    #[test]
    fn test_plain_groups_apply_in_sequence() {
        let out = sanitize(
            "Based on the document I found that the answer is 7",
            AnswerMode::Plain,
        );
        // Later groups are anchored, so the space left by group 1 shields the rest.
        assert_eq!(out.answer, "I found that the answer is 7");
    }

    #[test]
    fn test_plain_only_strips_at_start() {
        let raw = "Revenue, according to the document, grew.";
        assert_eq!(sanitize(raw, AnswerMode::Plain).answer, raw);
    }

    #[test]
    fn test_plain_keeps_emphasis() {
        let out = sanitize("**Bold** claim", AnswerMode::Plain);
        assert_eq!(out.answer, "**Bold** claim");
    }

    #[test]
    fn test_word_boundary() {
        let out = sanitize("Here isolation rules apply", AnswerMode::Plain);
        assert_eq!(out.answer, "Here isolation rules apply");
    }

    #[test]
    fn test_idempotent() {
        for mode in [AnswerMode::Plain, AnswerMode::Reasoning] {
            let once = sanitize("Profit rose: **3%** year on year.", mode);
            let twice = sanitize(&once.answer, mode);
            assert_eq!(once.answer, twice.answer);
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize("", AnswerMode::Plain).answer, "");
        let out = sanitize("<think>only thoughts</think>", AnswerMode::Reasoning);
        assert_eq!(out.answer, "");
        assert_eq!(out.reasoning.as_deref(), Some("only thoughts"));
    }
}
