//! Korean article-reference normalization and extraction (spec §9,
//! "Korean text normalization" design note). This is a pure function and is
//! unit-tested on its own, as the spec explicitly calls for, since it is a
//! "potential source of subtle bugs in exact matching".
//!
//! Recognized surface form: `제N조[의M][제K항]`, e.g. `제36조`, `제36조의2`,
//! `제36조제1항`, `제36조의2제3항`. Variant spacing and the "-th" particle are
//! tolerated; statute-kind disambiguation is intentionally not performed
//! here (Open Question, spec §9) — callers that want it apply it downstream.

use once_cell::sync::Lazy;
use regex::Regex;

/// One parsed article reference found in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleReference {
    /// Article number, e.g. "36" or "36의2".
    pub article_number: String,
    /// Paragraph number within the article, if given, e.g. "1".
    pub paragraph_number: Option<String>,
}

impl ArticleReference {
    /// The substring that should appear within a conforming `paragraph_id`
    /// for this reference to be considered an exact match (spec §4.1
    /// `exact_match`'s stated rule).
    pub fn decode_fragment(&self) -> String {
        match &self.paragraph_number {
            Some(p) => format!("{}-{}", self.article_number, p),
            None => self.article_number.clone(),
        }
    }
}

// Matches optional whitespace between the tokens so "제 36 조" still parses;
// `의` sub-article suffix and `항` paragraph suffix are both optional.
static ARTICLE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"제\s*(\d+)\s*조(?:\s*의\s*(\d+))?(?:\s*제\s*(\d+)\s*항)?",
    )
    .expect("static regex must compile")
});

/// Collapse whitespace and strip variant forms of "제" spacing, then extract
/// every article reference found in `text`, in order of appearance.
pub fn normalize_and_extract(text: &str) -> Vec<ArticleReference> {
    let collapsed = collapse_whitespace(text);
    ARTICLE_REF
        .captures_iter(&collapsed)
        .map(|caps| {
            let article_main = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let sub_article = caps.get(2).map(|m| m.as_str());
            let paragraph_number = caps.get(3).map(|m| m.as_str().to_string());
            let article_number = match sub_article {
                Some(sub) => format!("{article_main}의{sub}"),
                None => article_main.to_string(),
            };
            ArticleReference {
                article_number,
                paragraph_number,
            }
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
