use crate::error::SearchError;
use crate::models::QueryIntent;
use crate::tokenizer::{extract_terms, StopWords};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub stop_words: StopWords,
    pub categories: Vec<String>,
    /// Words that join two numbers into an explicit price range.
    pub price_connectors: Vec<String>,
    /// How many characters before a lone number are read for a hint.
    pub context_window_chars: usize,
    pub at_most_nearby: Vec<String>,
    pub at_most_phrases: Vec<String>,
    pub at_most_fallback: Vec<String>,
    pub at_least_nearby: Vec<String>,
    pub at_least_phrases: Vec<String>,
    pub at_least_fallback: Vec<String>,
    /// Half-width of the range built around a lone number with no hint.
    pub approximate_tolerance: f64,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|word| (*word).to_string()).collect()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            stop_words: StopWords::query_words(),
            categories: words(&[
                "laptop", "computadora", "pc", "celular", "smartphone", "tablet", "monitor",
                "impresora", "scanner", "teclado", "mouse", "audífono", "auricular", "cámara",
                "disco", "memoria", "usb", "router", "televisor", "tv",
            ]),
            price_connectors: words(&[
                "hasta", "entre", "soles", "sol", "s/.", "s/", "dólares", "dolares", "dólar",
                "dolar", "$", "a", "y",
            ]),
            context_window_chars: 15,
            at_most_nearby: words(&["menos", "bajo", "económico", "barato"]),
            at_most_phrases: words(&["menos de", "máximo"]),
            at_most_fallback: words(&["menos", "máximo", "hasta", "no más"]),
            at_least_nearby: words(&["más", "encima", "mayor", "mínimo"]),
            at_least_phrases: words(&["más de", "mínimo"]),
            at_least_fallback: words(&["más", "mínimo", "desde", "arriba"]),
            approximate_tolerance: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceHint {
    AtMost,
    AtLeast,
    Around,
}

#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    config: AnalyzerConfig,
    price_pattern: Regex,
}

impl QueryAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, SearchError> {
        if !(0.0..1.0).contains(&config.approximate_tolerance) {
            return Err(SearchError::InvalidConfig(format!(
                "approximate_tolerance must be in [0, 1), got {}",
                config.approximate_tolerance
            )));
        }

        let connectors = config
            .price_connectors
            .iter()
            .map(|connector| regex::escape(connector))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = if connectors.is_empty() {
            "([0-9]+)".to_string()
        } else {
            format!(r"([0-9]+)(?:\s*(?:{connectors})\s*([0-9]+)?)?")
        };

        Ok(Self {
            price_pattern: Regex::new(&pattern)?,
            config,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, query: &str) -> QueryIntent {
        let lowered = query.to_lowercase();
        let keywords = extract_terms(&lowered, &self.config.stop_words);

        let categories = self
            .config
            .categories
            .iter()
            .filter(|category| {
                lowered.contains(category.as_str())
                    || keywords.iter().any(|keyword| keyword.contains(category.as_str()))
            })
            .cloned()
            .collect::<Vec<_>>();

        let (price_min, price_max) = self.extract_price(&lowered);
        let intent = QueryIntent::new(keywords, categories, price_min, price_max);

        debug!(
            keywords = ?intent.keywords(),
            categories = ?intent.categories(),
            price_min = ?intent.price_min(),
            price_max = ?intent.price_max(),
            "query analyzed"
        );

        intent
    }

    /// The first explicit `N <connector> M` pair wins. Lone numbers before it
    /// are read through their surrounding words; later ones overwrite earlier
    /// ones.
    fn extract_price(&self, lowered: &str) -> (Option<f64>, Option<f64>) {
        let mut min = None;
        let mut max = None;

        for captures in self.price_pattern.captures_iter(lowered) {
            let Some(first) = captures.get(1) else {
                continue;
            };
            let Ok(first_value) = first.as_str().parse::<u64>() else {
                continue;
            };
            let second_value = captures
                .get(2)
                .and_then(|second| second.as_str().parse::<u64>().ok());

            if let Some(second_value) = second_value {
                min = Some(first_value.min(second_value) as f64);
                max = Some(first_value.max(second_value) as f64);
                break;
            }

            let value = first_value as f64;
            match self.hint_for(lowered, first.start()) {
                PriceHint::AtMost => max = Some(value),
                PriceHint::AtLeast => min = Some(value),
                PriceHint::Around => {
                    let slack = (value * self.config.approximate_tolerance).round();
                    min = Some((value - slack).max(0.0));
                    max = Some(value + slack);
                }
            }
        }

        (min, max)
    }

    fn hint_for(&self, lowered: &str, number_start: usize) -> PriceHint {
        let preceding = lowered[..number_start].chars().collect::<Vec<_>>();
        let window_start = preceding
            .len()
            .saturating_sub(self.config.context_window_chars);
        let nearby = preceding[window_start..].iter().collect::<String>();

        let config = &self.config;

        if mentions_any(&nearby, &config.at_most_nearby)
            || mentions_any(lowered, &config.at_most_phrases)
        {
            PriceHint::AtMost
        } else if mentions_any(&nearby, &config.at_least_nearby)
            || mentions_any(lowered, &config.at_least_phrases)
        {
            PriceHint::AtLeast
        } else if mentions_any(lowered, &config.at_most_fallback) {
            PriceHint::AtMost
        } else if mentions_any(lowered, &config.at_least_fallback) {
            PriceHint::AtLeast
        } else {
            PriceHint::Around
        }
    }
}

fn mentions_any(text: &str, words: &[String]) -> bool {
    words.iter().any(|word| text.contains(word.as_str()))
}
