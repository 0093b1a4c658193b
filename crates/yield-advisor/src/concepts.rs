//! Query Text Analysis
//!
//! Word-level keyword matching and concept extraction shared by the router's
//! intent classifier, the analyzer agent and the strategy reasoner. All of it
//! is pure: same text in, same answer out.

use rust_decimal::Decimal;

use crate::model::RiskTolerance;

/// Asset symbols recognised in queries
pub const KNOWN_ASSETS: &[&str] = &[
    "SOL", "USDC", "USDT", "RAY", "JUP", "MSOL", "JITOSOL", "BONK", "ETH", "BTC",
];

/// Protocol names recognised in queries. `Orca` is treated as a protocol,
/// never as the ORCA token.
pub const KNOWN_PROTOCOLS: &[&str] = &["Orca", "Raydium", "Kamino", "Marginfi", "Solend", "Jupiter"];

/// Lowercased, punctuation-free form padded with spaces for whole-word lookups
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized(String);

impl Normalized {
    pub fn new(text: &str) -> Self {
        let mut out = String::with_capacity(text.len() + 2);
        out.push(' ');
        for c in text.chars() {
            if c.is_alphanumeric() {
                out.extend(c.to_lowercase());
            } else if c == '\'' || c == '’' {
                // "what's" -> "whats"
            } else if !out.ends_with(' ') {
                out.push(' ');
            }
        }
        if !out.ends_with(' ') {
            out.push(' ');
        }
        Self(out)
    }

    /// Whole-word (or whole-phrase) match
    pub fn has(&self, term: &str) -> bool {
        self.0.contains(&format!(" {term} "))
    }

    pub fn has_any(&self, terms: &[&str]) -> bool {
        terms.iter().any(|t| self.has(t))
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Normalized words without the padding, usable as a [`Self::has`] term
    pub fn as_phrase(&self) -> String {
        self.0.trim().to_string()
    }
}

/// Uppercased symbol-ish tokens; `/` is read as a pair separator
fn symbol_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '/'))
        .map(|t| t.trim_matches(|c| c == '-' || c == '/').replace('/', "-").to_uppercase())
        .filter(|t| !t.is_empty())
}

fn is_known_asset(symbol: &str) -> bool {
    KNOWN_ASSETS.contains(&symbol)
}

/// Asset symbols and pairs mentioned in `text`, in order of appearance
pub fn extract_assets(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |symbol: String| {
        if !found.contains(&symbol) {
            found.push(symbol);
        }
    };

    for token in symbol_tokens(text) {
        if token.contains('-') {
            let legs: Vec<&str> = token.split('-').collect();
            if legs.len() == 2 && legs.iter().all(|leg| is_known_asset(leg)) {
                push(token.clone());
                continue;
            }
            for leg in legs.into_iter().filter(|leg| is_known_asset(leg)) {
                push(leg.to_string());
            }
        } else if is_known_asset(&token) {
            push(token);
        }
    }
    found
}

/// Protocols named in `text`, in order of appearance
pub fn extract_protocols(text: &str) -> Vec<&'static str> {
    let mut found = Vec::new();
    for token in symbol_tokens(text).flat_map(|t| t.split('-').map(str::to_string).collect::<Vec<_>>()) {
        if let Some(name) = KNOWN_PROTOCOLS.iter().find(|p| p.eq_ignore_ascii_case(&token)) {
            if !found.contains(name) {
                found.push(*name);
            }
        }
    }
    found
}

/// Investment amount in USD: `$1,000`, `1000 USDC`, `250 dollars`
pub fn extract_amount(text: &str) -> Option<Decimal> {
    const UNITS: &[&str] = &["usd", "usdc", "usdt", "dollar", "dollars"];

    let words: Vec<&str> = text.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let word = word.trim_end_matches(|c: char| matches!(c, '?' | '!' | ',' | ';' | ':' | '.'));
        let dollar = word.starts_with('$');
        let digits = word.trim_start_matches('$').replace(',', "");
        if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let Ok(amount) = digits.parse::<Decimal>() else {
            continue;
        };
        let unit_follows = words.get(i + 1).is_some_and(|next| {
            let next = next
                .trim_end_matches(|c: char| !c.is_alphanumeric())
                .to_ascii_lowercase();
            UNITS.contains(&next.as_str())
        });
        if (dollar || unit_follows) && amount > Decimal::ZERO {
            return Some(amount);
        }
    }
    None
}

/// Risk tolerance stated in `text`, if any
pub fn extract_tolerance(text: &str) -> Option<RiskTolerance> {
    let norm = Normalized::new(text);
    if norm.has_any(&["conservative", "low risk", "safest", "stable", "capital preservation"]) {
        Some(RiskTolerance::Conservative)
    } else if norm.has_any(&["aggressive", "high risk", "degen", "maximum yield", "max yield"]) {
        Some(RiskTolerance::Aggressive)
    } else if norm.has_any(&["moderate", "balanced", "medium risk"]) {
        Some(RiskTolerance::Moderate)
    } else {
        None
    }
}
