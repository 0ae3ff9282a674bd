//! Free-text mining for PC-build requests.
//!
//! Requests are short Vietnamese or English sentences such as
//! `"build pc cho gaming 20 triệu"`. Three facets are tallied:
//!
//! - **words**: lowercase alphanumeric tokens minus stop words, numbers and
//!   single characters, counted per occurrence
//! - **budgets**: number + unit mentions normalized to `"<n> triệu"` or
//!   `"<n> nghìn"`, counted once per request. The bare `k`/`m` units also
//!   name hardware (`"màn 4k"`, `"dây 2m"`), so they only count right after a
//!   budget cue such as `tầm` or `ngân sách`
//! - **purposes**: keyword matches against a fixed purpose table, counted
//!   once per request

use crate::tally::{rank_desc, Tally};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use storefront_insights_core::coerce::count_f64;

/// Vietnamese function words, generic build vocabulary and currency units.
const STOP_WORDS: &[&str] = &[
    "à", "ạ", "ai", "anh", "bạn", "bằng", "bị", "bộ", "build", "các", "cái", "cần", "cấu",
    "cho", "chị", "có", "của", "cũng", "củ", "đang", "đã", "để", "đến", "đi", "đó", "đồng",
    "dưới", "được", "em", "giá", "giúp", "hãy", "hình", "hơn", "khoảng", "không", "là", "lắp",
    "lên", "m", "mà", "máy", "mình", "một", "muốn", "nên", "nghìn", "ngàn", "nha", "nhé",
    "nhất", "những", "này", "pc", "ra", "ráp", "rất", "rồi", "tầm", "thì", "tính", "tôi",
    "tr", "trên", "triệu", "trong", "từ", "và", "vào", "vnd", "vnđ", "với", "xin", "k",
];

/// Purpose label and the phrases that signal it.
const PURPOSES: &[(&str, &[&str])] = &[
    ("gaming", &["gaming", "game", "chơi game", "esport", "esports"]),
    ("đồ họa", &["đồ họa", "đồ hoạ", "do hoa", "thiết kế", "design", "photoshop", "render", "3d"]),
    ("văn phòng", &["văn phòng", "van phong", "office", "excel"]),
    ("lập trình", &["lập trình", "lap trinh", "code", "coding", "developer", "programming"]),
    ("streaming", &["stream", "streaming", "livestream"]),
    ("dựng phim", &["dựng phim", "dung phim", "edit video", "video editing", "premiere"]),
    ("học tập", &["học tập", "hoc tap", "học", "sinh viên", "student", "study"]),
    ("AI/ML", &["ai", "machine learning", "deep learning", "ml"]),
];

/// Words that introduce a budget; required before a bare `k` or `m` amount.
const BUDGET_CUES: &[&str] = &[
    "budget", "dưới", "duoi", "giá", "gia", "khoảng", "khoang", "max", "ngân sách",
    "ngan sach", "tầm", "tam", "tối đa", "toi da", "under",
];

#[allow(clippy::expect_used)]
static BUDGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(triệu|tr|củ|m|nghìn|ngàn|k)\b")
        .expect("budget pattern is a valid regex")
});

/// A term and how often it occurred.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermCount {
    /// The term.
    pub term: String,
    /// Occurrences.
    pub count: u64,
}

/// The three facets of a word cloud, most frequent first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCloud {
    /// Content words.
    pub words: Vec<TermCount>,
    /// Normalized budget mentions.
    pub budgets: Vec<TermCount>,
    /// Detected purposes.
    pub purposes: Vec<TermCount>,
}

/// Accumulates requests into a [`WordCloud`].
///
/// # Example
///
/// ```
/// use storefront_insights_analytics::text::WordCloudBuilder;
///
/// let mut builder = WordCloudBuilder::new();
/// builder.add("build pc cho gaming 20 triệu");
/// let cloud = builder.finish(10);
/// assert_eq!(cloud.words[0].term, "gaming");
/// assert_eq!(cloud.budgets[0].term, "20 triệu");
/// assert_eq!(cloud.purposes[0].term, "gaming");
/// ```
#[derive(Debug, Default)]
pub struct WordCloudBuilder {
    words: Tally<String, u64>,
    budgets: Tally<String, u64>,
    purposes: Tally<String, u64>,
}

impl WordCloudBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mine one request.
    pub fn add(&mut self, text: &str) {
        let lowered = text.to_lowercase();
        let tokens = tokenize(&lowered);

        for token in &tokens {
            if is_content_word(token) {
                *self.words.entry((*token).to_string()) += 1;
            }
        }

        let mut budgets = HashSet::new();
        for capture in BUDGET.captures_iter(&lowered) {
            let start = capture.get(0).map_or(0, |m| m.start());
            if matches!(&capture[2], "k" | "m") && !follows_budget_cue(&lowered[..start]) {
                continue;
            }
            if let Some(budget) = normalize_budget(&capture[1], &capture[2]) {
                if budgets.insert(budget.clone()) {
                    *self.budgets.entry(budget) += 1;
                }
            }
        }

        // Pad so phrase matches only land on token boundaries.
        let joined = format!(" {} ", tokens.join(" "));
        for (purpose, phrases) in PURPOSES {
            if phrases.iter().any(|phrase| joined.contains(&format!(" {phrase} "))) {
                *self.purposes.entry((*purpose).to_string()) += 1;
            }
        }
    }

    /// Rank each facet and keep at most `limit` terms per facet.
    #[must_use]
    pub fn finish(self, limit: usize) -> WordCloud {
        WordCloud {
            words: ranked(self.words, limit),
            budgets: ranked(self.budgets, limit),
            purposes: ranked(self.purposes, limit),
        }
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect()
}

fn is_content_word(token: &str) -> bool {
    token.chars().count() > 1
        && !token.chars().all(char::is_numeric)
        && !STOP_WORDS.contains(&token)
}

/// Whether the last one or two tokens of `before` form a budget cue.
fn follows_budget_cue(before: &str) -> bool {
    let tokens = tokenize(before);
    (1..=2)
        .filter_map(|n| tokens.len().checked_sub(n))
        .any(|from| BUDGET_CUES.contains(&tokens[from..].join(" ").as_str()))
}

fn normalize_budget(amount: &str, unit: &str) -> Option<String> {
    let value: f64 = amount.replace(',', ".").parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let amount = if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    };
    let unit = match unit {
        "nghìn" | "ngàn" | "k" => "nghìn",
        _ => "triệu",
    };
    Some(format!("{amount} {unit}"))
}

fn ranked(tally: Tally<String, u64>, limit: usize) -> Vec<TermCount> {
    let mut rows: Vec<TermCount> = tally
        .into_vec()
        .into_iter()
        .map(|(term, count)| TermCount { term, count })
        .collect();
    rank_desc(&mut rows, limit, |row| count_f64(row.count));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mine(requests: &[&str]) -> WordCloud {
        let mut builder = WordCloudBuilder::new();
        for request in requests {
            builder.add(request);
        }
        builder.finish(20)
    }

    fn terms(counts: &[TermCount]) -> Vec<&str> {
        counts.iter().map(|c| c.term.as_str()).collect()
    }

    #[test]
    fn gaming_request_yields_word_purpose_and_budget() {
        let cloud = mine(&["build pc cho gaming 20 triệu"]);
        assert_eq!(terms(&cloud.words), vec!["gaming"]);
        assert_eq!(terms(&cloud.purposes), vec!["gaming"]);
        assert_eq!(terms(&cloud.budgets), vec!["20 triệu"]);
    }

    #[test]
    fn stop_words_numbers_and_single_characters_are_dropped() {
        let cloud = mine(&["Tôi muốn 1 máy tính x 2024 để lập trình"]);
        let words = terms(&cloud.words);
        assert!(!words.contains(&"tôi"));
        assert!(!words.contains(&"2024"));
        assert!(!words.contains(&"x"));
        assert!(words.contains(&"lập"));
        assert_eq!(terms(&cloud.purposes), vec!["lập trình"]);
    }

    #[test]
    fn budget_units_are_normalized() {
        let cloud = mine(&["tầm 15tr", "khoảng 15 củ", "tầm 500k", "1,5 triệu"]);
        assert_eq!(
            cloud.budgets,
            vec![
                TermCount { term: "15 triệu".to_string(), count: 2 },
                TermCount { term: "500 nghìn".to_string(), count: 1 },
                TermCount { term: "1.5 triệu".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn bare_k_and_m_need_a_budget_cue() {
        let cloud = mine(&["màn 4k 144hz", "dây hdmi 2m", "ngân sách 25m", "budget 800k"]);
        assert_eq!(terms(&cloud.budgets), vec!["25 triệu", "800 nghìn"]);
    }

    #[test]
    fn facets_count_once_per_request_but_words_per_occurrence() {
        let cloud = mine(&["gaming gaming 20 triệu 20 triệu"]);
        assert_eq!(cloud.words[0], TermCount { term: "gaming".to_string(), count: 2 });
        assert_eq!(cloud.purposes[0].count, 1);
        assert_eq!(cloud.budgets[0].count, 1);
    }

    #[test]
    fn purpose_keywords_match_whole_tokens_only() {
        let cloud = mine(&["gửi email cho tôi"]);
        assert!(cloud.purposes.is_empty(), "'ai' inside 'email' is not AI/ML");
    }
}
