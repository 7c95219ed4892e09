use std::collections::{HashMap, HashSet};
use tokenizers::Encoding;

use super::shapley::CoalitionValue;
use crate::error::{PipelineError, Result};
use crate::pipelines::sentiment::model::{EncodedBatch, SequenceClassificationModel};
use crate::pipelines::sentiment::SentimentPipeline;

/// A subset of players (attributed token positions), stored as a bitset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Coalition {
    words: Vec<u64>,
}

impl Coalition {
    pub fn empty(players: usize) -> Self {
        Self {
            words: vec![0; players.div_ceil(64)],
        }
    }

    pub fn full(players: usize) -> Self {
        let mut c = Self::empty(players);
        for i in 0..players {
            c.insert(i);
        }
        c
    }

    /// The coalition whose members are the set bits of `bits`. Needs `players <= 64`.
    pub fn from_bits(bits: u64, players: usize) -> Self {
        let mut c = Self::empty(players);
        if let Some(word) = c.words.first_mut() {
            *word = bits;
        }
        c
    }

    pub fn contains(&self, player: usize) -> bool {
        self.words[player / 64] & (1 << (player % 64)) != 0
    }

    pub fn insert(&mut self, player: usize) {
        self.words[player / 64] |= 1 << (player % 64);
    }

    pub fn remove(&mut self, player: usize) {
        self.words[player / 64] &= !(1 << (player % 64));
    }
}

/// The maskable view of one encoding: which positions are players and what hides them.
///
/// Special tokens and padding are never players and are never replaced.
pub(crate) struct TokenMasker {
    ids: Vec<u32>,
    attention_mask: Vec<u32>,
    type_ids: Vec<u32>,
    positions: Vec<usize>,
    mask_id: u32,
}

impl TokenMasker {
    pub fn new(encoding: &Encoding, mask_id: u32) -> Self {
        let positions = encoding
            .get_attention_mask()
            .iter()
            .zip(encoding.get_special_tokens_mask())
            .enumerate()
            .filter(|(_, (&attend, &special))| attend == 1 && special == 0)
            .map(|(i, _)| i)
            .collect();

        Self {
            ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            type_ids: encoding.get_type_ids().to_vec(),
            positions,
            mask_id,
        }
    }

    pub fn players(&self) -> usize {
        self.positions.len()
    }

    /// Encoding positions of the players, in text order.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Input ids with every player outside `coalition` replaced by the mask token.
    pub fn materialize(&self, coalition: &Coalition) -> Vec<u32> {
        let mut ids = self.ids.clone();
        for (player, &pos) in self.positions.iter().enumerate() {
            if !coalition.contains(player) {
                ids[pos] = self.mask_id;
            }
        }
        ids
    }

    fn push_row(&self, batch: &mut EncodedBatch, coalition: &Coalition) -> Result<()> {
        batch.push(
            &self.materialize(coalition),
            &self.attention_mask,
            &self.type_ids,
        )
    }
}

/// Runs coalitions through a pipeline in batches, evaluating each distinct one once.
pub(crate) struct CoalitionEvaluator<'a, M: SequenceClassificationModel> {
    pipeline: &'a SentimentPipeline<M>,
    masker: &'a TokenMasker,
    batch_size: usize,
    memo: HashMap<Coalition, Vec<f64>>,
    evaluations: usize,
}

impl<'a, M: SequenceClassificationModel> CoalitionEvaluator<'a, M> {
    pub fn new(pipeline: &'a SentimentPipeline<M>, masker: &'a TokenMasker, batch_size: usize) -> Self {
        Self {
            pipeline,
            masker,
            batch_size: batch_size.max(1),
            memo: HashMap::new(),
            evaluations: 0,
        }
    }

    /// Model rows evaluated so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

impl<M: SequenceClassificationModel> CoalitionValue for CoalitionEvaluator<'_, M> {
    fn values(&mut self, coalitions: &[Coalition]) -> Result<Vec<Vec<f64>>> {
        let mut queued = HashSet::new();
        let pending: Vec<&Coalition> = coalitions
            .iter()
            .filter(|c| !self.memo.contains_key(*c) && queued.insert(*c))
            .collect();

        for chunk in pending.chunks(self.batch_size) {
            let mut batch = EncodedBatch::new(self.pipeline.max_length());
            for coalition in chunk {
                self.masker.push_row(&mut batch, coalition)?;
            }

            let rows = self.pipeline.predict_encoded(&batch)?;
            self.evaluations += chunk.len();

            for (coalition, row) in chunk.iter().zip(rows) {
                if row.iter().any(|p| !p.is_finite()) {
                    return Err(PipelineError::Attribution(format!(
                        "Model produced non-finite probabilities for a masked input of '{}'",
                        self.pipeline.model_id()
                    )));
                }
                self.memo
                    .insert((*coalition).clone(), row.into_iter().map(f64::from).collect());
            }
        }

        coalitions
            .iter()
            .map(|c| {
                self.memo.get(c).cloned().ok_or_else(|| {
                    PipelineError::Unexpected("Coalition value missing after evaluation".into())
                })
            })
            .collect()
    }
}
