//! Bounded leaderboard of scan results, one entry per symbol, best first.
//!
//! Entries are keyed by symbol. A result for a symbol already on the board
//! replaces the old one only when it scores higher. Equal scores order by
//! symbol ascending so a scan always prints the same table.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use coinscout_core::domain::AnalysisResult;
use coinscout_core::GridAnalysis;

/// Anything the leaderboard can rank.
pub trait Scored {
    fn symbol(&self) -> &str;
    /// Higher is better. Non-finite scores are never ranked.
    fn score(&self) -> f64;
}

impl Scored for AnalysisResult {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Confidence × expected return.
    fn score(&self) -> f64 {
        self.composite_score()
    }
}

impl Scored for GridAnalysis {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn score(&self) -> f64 {
        self.composite_score
    }
}

/// Outcome of an insert operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    /// Replaced the same symbol's entry with a better score.
    Replaced,
    /// Worse duplicate, below the cut, or non-finite score.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Leaderboard<T> {
    entries: Vec<T>,
    max_size: usize,
}

/// A leaderboard position as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry<T> {
    /// 1-based position.
    pub rank: usize,
    pub score: f64,
    /// Position among everything that was ranked, in [0, 1]; 1 is best.
    pub percentile: f64,
    pub entry: T,
}

fn compare<T: Scored>(a: &T, b: &T) -> Ordering {
    b.score()
        .partial_cmp(&a.score())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.symbol().cmp(b.symbol()))
}

impl<T: Scored> Leaderboard<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    pub fn insert(&mut self, entry: T) -> InsertResult {
        if !entry.score().is_finite() {
            return InsertResult::Skipped;
        }

        if let Some(idx) = self.entries.iter().position(|e| e.symbol() == entry.symbol()) {
            if entry.score() > self.entries[idx].score() {
                self.entries[idx] = entry;
                self.entries.sort_by(compare);
                return InsertResult::Replaced;
            }
            return InsertResult::Skipped;
        }

        if self.entries.len() < self.max_size {
            self.entries.push(entry);
            self.entries.sort_by(compare);
            InsertResult::Inserted
        } else if let Some(worst) = self.entries.last() {
            if compare(&entry, worst) == Ordering::Less {
                self.entries.pop();
                self.entries.push(entry);
                self.entries.sort_by(compare);
                InsertResult::Inserted
            } else {
                InsertResult::Skipped
            }
        } else {
            InsertResult::Skipped
        }
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn into_entries(self) -> Vec<T> {
        self.entries
    }
}

/// Rank all candidates and keep the best `top_n`.
///
/// Percentiles are computed over every finite-scored candidate, so the
/// kept entries show where they sit in the whole scan.
pub fn rank_top<T: Scored>(candidates: Vec<T>, top_n: usize) -> Vec<RankedEntry<T>> {
    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| c.score())
        .filter(|s| s.is_finite())
        .collect();
    let percentiles = rank_normalize(&scores, true);

    let mut board = Leaderboard::new(top_n);
    for candidate in candidates {
        board.insert(candidate);
    }

    board
        .into_entries()
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let score = entry.score();
            let percentile = scores
                .iter()
                .position(|s| *s == score)
                .map_or(0.0, |idx| percentiles[idx]);
            RankedEntry {
                rank: i + 1,
                score,
                percentile,
                entry,
            }
        })
        .collect()
}

/// Rank-based normalization to [0, 1]. Ties share their average rank; a
/// single value maps to 0.5.
pub fn rank_normalize(values: &[f64], higher_is_better: bool) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0.5];
    }

    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0_f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && (indexed[j].1 - indexed[i].1).abs() < 1e-15 {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for idx in &indexed[i..j] {
            ranks[idx.0] = avg_rank;
        }
        i = j;
    }

    let max_rank = n as f64;
    ranks
        .iter()
        .map(|r| (r - 1.0) / (max_rank - 1.0))
        .map(|v| if higher_is_better { v } else { 1.0 - v })
        .collect()
}

// ─── Tests ───────────────────────────
