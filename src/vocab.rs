//! Token and label vocabularies, and labelled corpora for the bandit trainer.
//!
//! Vocabularies are built once during setup and are immutable afterwards.
//! The caller owns them; estimators never see them.

use std::collections::HashMap;

use thiserror::Error;

use crate::environment::{Action, Observation};

/// Padding token, always id 0 in a padded vocabulary.
pub const PAD: &str = "<<PAD>>";

/// Errors raised while building a corpus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("corpus has {inputs} inputs but {labels} labels")]
    LengthMismatch { inputs: usize, labels: usize },

    #[error("corpus is empty")]
    Empty,

    #[error("example {index} has width {actual}, expected {expected}")]
    RaggedObservations {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("example {index} has no labels")]
    NoLabels { index: usize },

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("unknown label: {0}")]
    UnknownLabel(String),
}

/// Bidirectional mapping between strings and dense ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, usize>,
}

impl Vocabulary {
    /// Builds a vocabulary with ids in first-seen order.
    pub fn build<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::default();
        for token in tokens {
            vocab.insert(token.as_ref());
        }
        vocab
    }

    /// Builds a vocabulary whose id 0 is [`PAD`].
    pub fn with_padding<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::default();
        vocab.insert(PAD);
        for token in tokens {
            vocab.insert(token.as_ref());
        }
        vocab
    }

    fn insert(&mut self, token: &str) {
        if !self.ids.contains_key(token) {
            self.ids.insert(token.to_string(), self.tokens.len());
            self.tokens.push(token.to_string());
        }
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Maps every token to its id.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<usize>, CorpusError> {
        tokens
            .iter()
            .map(|t| {
                self.id(t.as_ref())
                    .ok_or_else(|| CorpusError::UnknownToken(t.as_ref().to_string()))
            })
            .collect()
    }
}

/// Lower-cases and whitespace-splits an utterance.
pub fn tokenize(utterance: &str) -> Vec<String> {
    utterance
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Fixed-width observations paired with their accepted labels.
///
/// The first label of each example is its primary label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledCorpus {
    observations: Vec<Observation>,
    labels: Vec<Vec<Action>>,
    obs_dim: usize,
}

impl LabelledCorpus {
    /// Pairs observations with label sets.
    ///
    /// # Errors
    ///
    /// Fails if the two inputs differ in length, the corpus is empty, the
    /// observations differ in width, or an example has no labels.
    pub fn new(
        observations: Vec<Observation>,
        labels: Vec<Vec<Action>>,
    ) -> Result<Self, CorpusError> {
        if observations.len() != labels.len() {
            return Err(CorpusError::LengthMismatch {
                inputs: observations.len(),
                labels: labels.len(),
            });
        }
        let obs_dim = observations.first().ok_or(CorpusError::Empty)?.len();
        for (index, obs) in observations.iter().enumerate() {
            if obs.len() != obs_dim {
                return Err(CorpusError::RaggedObservations {
                    index,
                    expected: obs_dim,
                    actual: obs.len(),
                });
            }
        }
        if let Some(index) = labels.iter().position(Vec::is_empty) {
            return Err(CorpusError::NoLabels { index });
        }
        Ok(Self {
            observations,
            labels,
            obs_dim,
        })
    }

    /// Encodes utterances as PAD-padded token id vectors.
    ///
    /// Each utterance is tokenized with [`tokenize`] and padded to the
    /// longest utterance; each label must exist in `label_vocab`.
    pub fn encode<U, L>(
        words: &Vocabulary,
        label_vocab: &Vocabulary,
        utterances: &[U],
        labels: &[L],
    ) -> Result<Self, CorpusError>
    where
        U: AsRef<str>,
        L: AsRef<str>,
    {
        if utterances.len() != labels.len() {
            return Err(CorpusError::LengthMismatch {
                inputs: utterances.len(),
                labels: labels.len(),
            });
        }
        let tokenized: Vec<Vec<String>> =
            utterances.iter().map(|u| tokenize(u.as_ref())).collect();
        let max_len = tokenized.iter().map(Vec::len).max().unwrap_or(0);
        let pad = words.id(PAD).unwrap_or(0) as f64;

        let mut observations = Vec::with_capacity(tokenized.len());
        for tokens in &tokenized {
            let mut row: Observation = words
                .encode(tokens)?
                .into_iter()
                .map(|id| id as f64)
                .collect();
            row.resize(max_len, pad);
            observations.push(row);
        }

        let label_ids = labels
            .iter()
            .map(|l| {
                label_vocab
                    .id(l.as_ref())
                    .map(|id| vec![id])
                    .ok_or_else(|| CorpusError::UnknownLabel(l.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(observations, label_ids)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observation_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn observation(&self, index: usize) -> &Observation {
        &self.observations[index]
    }

    pub fn labels(&self, index: usize) -> &[Action] {
        &self.labels[index]
    }

    /// Whether `action` earns the reward for example `index`.
    ///
    /// With `accept_any` every label in the set counts; otherwise only the
    /// primary label does.
    pub fn accepts(&self, index: usize, action: Action, accept_any: bool) -> bool {
        let labels = &self.labels[index];
        if accept_any {
            labels.contains(&action)
        } else {
            labels[0] == action
        }
    }
}
