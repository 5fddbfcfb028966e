use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::SignalScores;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    #[value(name = "categoric_tfidf_we")]
    CategoricTfidfWe,
    #[value(name = "categoric_tfidf")]
    CategoricTfidf,
    #[value(name = "categoric_we")]
    CategoricWe,
}

impl ScoringStrategy {
    pub const ALL: [Self; 3] = [Self::CategoricTfidfWe, Self::CategoricTfidf, Self::CategoricWe];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CategoricTfidfWe => "categoric_tfidf_we",
            Self::CategoricTfidf => "categoric_tfidf",
            Self::CategoricWe => "categoric_we",
        }
    }

    pub fn uses_tfidf(self) -> bool {
        matches!(self, Self::CategoricTfidfWe | Self::CategoricTfidf)
    }

    pub fn uses_embedding(self) -> bool {
        matches!(self, Self::CategoricTfidfWe | Self::CategoricWe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub tfidf: f64,
    pub embedding: f64,
    pub categoric: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            tfidf: 1.0,
            embedding: 1.0,
            categoric: 1.0,
        }
    }
}

/// Per-strategy blend weights, loadable from a JSON file such as
/// `{"categoric_tfidf_we": {"tfidf": 0.4, "embedding": 0.4, "categoric": 0.2}}`.
/// Strategies left out of the file keep uniform weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub categoric_tfidf_we: SignalWeights,
    pub categoric_tfidf: SignalWeights,
    pub categoric_we: SignalWeights,
}

impl ScoringConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read(path)
            .with_context(|| format!("failed to read scoring config: {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse scoring config: {}", path.display()))
    }

    pub fn weights(&self, strategy: ScoringStrategy) -> SignalWeights {
        match strategy {
            ScoringStrategy::CategoricTfidfWe => self.categoric_tfidf_we,
            ScoringStrategy::CategoricTfidf => self.categoric_tfidf,
            ScoringStrategy::CategoricWe => self.categoric_we,
        }
    }

    /// Weighted sum over the signals `strategy` selects; the others never
    /// contribute, whatever their configured weight.
    pub fn composite(&self, strategy: ScoringStrategy, signals: &SignalScores) -> f64 {
        let weights = self.weights(strategy);
        let mut score = weights.categoric * signals.categoric;
        if strategy.uses_tfidf() {
            score += weights.tfidf * signals.tfidf;
        }
        if strategy.uses_embedding() {
            score += weights.embedding * signals.embedding;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> SignalScores {
        SignalScores {
            tfidf: 0.3,
            embedding: 0.6,
            categoric: 0.5,
        }
    }

    #[test]
    fn default_weights_sum_selected_signals() {
        let config = ScoringConfig::default();
        let signals = signals();
        let all = config.composite(ScoringStrategy::CategoricTfidfWe, &signals);
        let lexical = config.composite(ScoringStrategy::CategoricTfidf, &signals);
        let semantic = config.composite(ScoringStrategy::CategoricWe, &signals);

        assert!((all - 1.4).abs() < 1e-12);
        assert!((lexical - 0.8).abs() < 1e-12);
        assert!((semantic - 1.1).abs() < 1e-12);
    }

    #[test]
    fn omitted_signal_never_contributes() {
        let config = ScoringConfig {
            categoric_tfidf: SignalWeights {
                tfidf: 1.0,
                embedding: 100.0,
                categoric: 0.0,
            },
            ..ScoringConfig::default()
        };
        let score = config.composite(ScoringStrategy::CategoricTfidf, &signals());
        assert!((score - 0.3).abs() < 1e-12);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_entries() {
        let raw = r#"{ "categoric_we": { "embedding": 0.25 } }"#;
        let config: ScoringConfig = serde_json::from_str(raw).expect("config parses");

        assert_eq!(
            config.weights(ScoringStrategy::CategoricWe),
            SignalWeights {
                tfidf: 1.0,
                embedding: 0.25,
                categoric: 1.0,
            }
        );
        assert_eq!(
            config.weights(ScoringStrategy::CategoricTfidfWe),
            SignalWeights::default()
        );
    }

    #[test]
    fn strategy_names_round_trip_through_serde_and_clap() {
        for strategy in ScoringStrategy::ALL {
            let json = serde_json::to_string(&strategy).expect("serializes");
            assert_eq!(json, format!("\"{}\"", strategy.as_str()));
            let parsed = ScoringStrategy::from_str(strategy.as_str(), false).expect("clap parses");
            assert_eq!(parsed, strategy);
        }
    }
}
