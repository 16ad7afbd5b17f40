use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Word;

static SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}[-\s]?\d{2}[-\s]?\d{4}$").unwrap());
static CREDIT_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{4}[-\s]?){3}\d{1,4}$").unwrap());
static PHONE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\d{3})[-.\s]?\d{3}[-.\s]?\d{4}$").unwrap()
});
static BANK_ACCOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d(?:[-\s]?\d){7,16}$").unwrap());
static ROUTING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d(?:[-\s]?\d){8}$").unwrap());

/// The closed set of sensitive-content categories the detector recognizes.
///
/// Each kind is bound to one matcher applied to a single word's text or to
/// the single-space join of a sliding window of consecutive words. Kinds are
/// tested in declaration order and the first hit wins; spans are merged
/// content-agnostically downstream, so the tag only affects reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Ssn,
    CreditCard,
    PhoneNumber,
    BankAccount,
    RoutingNumber,
}

impl PatternKind {
    pub fn all() -> &'static [PatternKind] {
        &[
            PatternKind::Ssn,
            PatternKind::CreditCard,
            PatternKind::PhoneNumber,
            PatternKind::BankAccount,
            PatternKind::RoutingNumber,
        ]
    }

    fn regex(&self) -> &'static Regex {
        match self {
            PatternKind::Ssn => &SSN,
            PatternKind::CreditCard => &CREDIT_CARD,
            PatternKind::PhoneNumber => &PHONE_NUMBER,
            PatternKind::BankAccount => &BANK_ACCOUNT,
            PatternKind::RoutingNumber => &ROUTING_NUMBER,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex().is_match(text.trim())
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PatternKind::Ssn => "ssn",
            PatternKind::CreditCard => "credit-card",
            PatternKind::PhoneNumber => "phone-number",
            PatternKind::BankAccount => "bank-account",
            PatternKind::RoutingNumber => "routing-number",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "ssn" => Ok(PatternKind::Ssn),
            "credit-card" | "creditcard" => Ok(PatternKind::CreditCard),
            "phone-number" | "phone" => Ok(PatternKind::PhoneNumber),
            "bank-account" | "bankaccount" => Ok(PatternKind::BankAccount),
            "routing-number" | "routing" => Ok(PatternKind::RoutingNumber),
            _ => Err(format!(
                "Unknown pattern kind: {}. Use ssn, credit-card, phone-number, bank-account, or routing-number",
                s
            )),
        }
    }
}

/// A candidate time range derived from one textual match, before merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSpan {
    pub start: f64,
    pub end: f64,
    pub kind: PatternKind,
}

/// Tunable detection parameters.
///
/// Sensitive values commonly span a spoken pause at the boundary; the
/// context padding widens each span so a trimmed fragment of the value is
/// never left audible.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Words of leading context folded into a span's start.
    pub lead_context_words: usize,
    /// Words of trailing context folded into a span's end.
    pub trail_context_words: usize,
    /// Smallest multi-word window tested.
    pub min_window: usize,
    /// Largest multi-word window tested.
    pub max_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            lead_context_words: 3,
            trail_context_words: 2,
            min_window: 2,
            max_window: 6,
        }
    }
}

struct OpenSpan {
    start: f64,
    end: f64,
    kind: PatternKind,
}

/// Scan a word stream for sensitive textual patterns and emit raw time spans.
///
/// Each position is tested as a single word first, then as sliding windows of
/// `min_window..=max_window` consecutive words joined by a single space,
/// stopping at the first window size that matches any pattern so one spoken
/// occurrence produces one contiguous span. Consecutive matching positions
/// extend a single accumulator whose `end` only ever moves forward; the span
/// is closed with trailing context when the scan goes non-matching, and any
/// still-open accumulator is flushed at stream end. Context indices clamp to
/// the stream bounds.
pub fn detect(words: &[Word], patterns: &[PatternKind], cfg: &DetectorConfig) -> Vec<RawSpan> {
    let mut spans = Vec::new();
    let mut current: Option<OpenSpan> = None;

    for i in 0..words.len() {
        match match_at(words, i, patterns, cfg) {
            Some((kind, span_words)) => {
                let match_end = words[i + span_words - 1].end;
                match current {
                    None => {
                        let lead = i.saturating_sub(cfg.lead_context_words);
                        debug!(
                            "Opened {kind} span at word {i} ({:.2}s-{:.2}s)",
                            words[lead].start, match_end
                        );
                        current = Some(OpenSpan {
                            start: words[lead].start,
                            end: match_end,
                            kind,
                        });
                    }
                    Some(ref mut open) => {
                        open.end = open.end.max(match_end);
                        open.kind = kind;
                    }
                }
            }
            None => {
                if let Some(open) = current.take() {
                    spans.push(close_span(open, words, i, cfg));
                }
            }
        }
    }

    if let Some(open) = current.take() {
        spans.push(close_span(open, words, words.len(), cfg));
    }

    spans
}

/// Close an accumulator at scan position `i`, folding in trailing context.
fn close_span(open: OpenSpan, words: &[Word], i: usize, cfg: &DetectorConfig) -> RawSpan {
    let trail = (i + cfg.trail_context_words).min(words.len() - 1);
    RawSpan {
        start: open.start,
        end: open.end.max(words[trail].end),
        kind: open.kind,
    }
}

/// Test position `i`: the single word first, then growing windows.
///
/// Returns the matched kind and the number of words the match covered.
fn match_at(
    words: &[Word],
    i: usize,
    patterns: &[PatternKind],
    cfg: &DetectorConfig,
) -> Option<(PatternKind, usize)> {
    for kind in patterns {
        if kind.matches(&words[i].text) {
            return Some((*kind, 1));
        }
    }

    for size in cfg.min_window..=cfg.max_window {
        if i + size > words.len() {
            break;
        }
        let window = words[i..i + size]
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for kind in patterns {
            if kind.matches(&window) {
                return Some((*kind, size));
            }
        }
    }

    None
}
