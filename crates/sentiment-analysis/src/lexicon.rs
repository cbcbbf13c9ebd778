//! Word-list headline scoring, for callers that only have raw news text.

use std::collections::HashSet;

use analysis_core::SentimentItem;
use chrono::{DateTime, Utc};

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "gains", "profit", "growth", "beat", "beats",
    "upgrade", "outperform", "strong", "positive", "rise", "rises", "increase",
    "breakthrough", "innovation", "success", "exceed", "exceeds", "momentum",
    "optimistic", "record", "advance",
    "dividend", "buyback", "repurchase", "accretive", "upside",
    "recovery", "rebound", "expansion", "robust", "accelerating",
    "overweight", "raised", "upgraded", "outpacing", "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "declines", "loss", "losses", "fall", "falls", "plunge", "crash",
    "miss", "misses", "downgrade", "underperform", "weak", "negative", "drop", "decrease",
    "concern", "fail", "disappoint", "slump", "warning", "pessimistic", "retreat", "fear",
    "trouble",
    "dilution", "dilutive", "headwind", "lawsuit", "litigation",
    "recall", "investigation", "probe", "default", "bankruptcy",
    "restructuring", "layoff", "layoffs", "downside", "overvalued", "bubble",
    "underweight", "lowered", "suspended", "downgraded",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without",
];

/// A negation flips sentiment words up to this many tokens after it.
const NEGATION_WINDOW: usize = 3;

/// Raw hit counts at which the polarity reaches tanh(1)
const HIT_SCALE: f64 = 2.0;

/// Kind of news event, used as the relevance of a headline-derived item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsEventType {
    Earnings,
    MergersAcq,
    Regulatory,
    AnalystAction,
    Management,
    Product,
    Legal,
    Macro,
    General,
}

impl NewsEventType {
    /// Relevance in [0, 1]; deal news is the most price-moving.
    pub fn relevance(&self) -> f64 {
        match self {
            NewsEventType::MergersAcq => 1.0,
            NewsEventType::Earnings | NewsEventType::Regulatory => 0.8,
            NewsEventType::AnalystAction | NewsEventType::Legal => 0.6,
            NewsEventType::Management => 0.52,
            NewsEventType::Product => 0.48,
            NewsEventType::General => 0.4,
            NewsEventType::Macro => 0.32,
        }
    }
}

pub fn classify_event(text: &str) -> NewsEventType {
    let text = text.to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("earnings") || has("quarterly") || has("guidance") || has("eps")
        || (has("revenue") && (has("beat") || has("miss") || has("report")))
    {
        NewsEventType::Earnings
    } else if has("acqui") || has("merger") || has("buyout") || has("takeover") || has("spin-off") {
        NewsEventType::MergersAcq
    } else if has("fda") || has("sec ") || has("regulat") || has("approval") || has("antitrust") {
        NewsEventType::Regulatory
    } else if has("upgrade") || has("downgrade") || has("price target") || has("analyst") || has("rating") {
        NewsEventType::AnalystAction
    } else if has("ceo") || has("cfo") || has("board") || has("resign") || has("appoint") {
        NewsEventType::Management
    } else if has("launch") || has("product") || has("recall") || has("patent") {
        NewsEventType::Product
    } else if has("lawsuit") || has("litigation") || has("settlement") || has("sued") || has("court") {
        NewsEventType::Legal
    } else if has("federal reserve") || has("interest rate") || has("inflation") || has("gdp") {
        NewsEventType::Macro
    } else {
        NewsEventType::General
    }
}

/// Scores free text against fixed positive/negative word lists.
pub struct Lexicon {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Net count of sentiment words, negated words counted with flipped sign.
    pub fn raw_score(&self, text: &str) -> i32 {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '"'))
            .filter(|w| !w.is_empty())
            .collect();

        let negations: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut score = 0;
        for (i, word) in words.iter().enumerate() {
            let sign = if self.positive.contains(*word) {
                1
            } else if self.negative.contains(*word) {
                -1
            } else {
                continue;
            };
            let negated = negations.iter().any(|&n| n < i && i - n <= NEGATION_WINDOW);
            score += if negated { -sign } else { sign };
        }
        score
    }

    /// Polarity in [-1, 1]
    pub fn polarity(&self, text: &str) -> f64 {
        (self.raw_score(text) as f64 / HIT_SCALE).tanh()
    }

    /// Build a sentiment item from a headline, using the event type as relevance.
    pub fn headline_item(&self, source: &str, timestamp: DateTime<Utc>, headline: &str) -> SentimentItem {
        SentimentItem {
            source: source.to_string(),
            timestamp,
            polarity: self.polarity(headline),
            relevance: classify_event(headline).relevance(),
        }
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}
