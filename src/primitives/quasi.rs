use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Map from measured basis-state index to (quasi-)probability.
///
/// Values may be negative when the map holds a derivative of a distribution
/// rather than a distribution itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QuasiDistribution {
    probabilities: BTreeMap<u64, f64>,
    shots: Option<u64>,
}

impl QuasiDistribution {
    pub fn new(probabilities: BTreeMap<u64, f64>, shots: Option<u64>) -> Self {
        Self { probabilities, shots }
    }

    /// Dense probability vector → distribution, dropping exact zeros.
    pub fn from_dense(dense: &[f64], shots: Option<u64>) -> Self {
        let probabilities = dense
            .iter()
            .enumerate()
            .filter(|(_, p)| **p != 0.0)
            .map(|(i, p)| (i as u64, *p))
            .collect();
        Self { probabilities, shots }
    }

    pub fn with_shots(mut self, shots: Option<u64>) -> Self {
        self.shots = shots;
        self
    }

    /// Value for `outcome`; absent outcomes are 0.
    pub fn get(&self, outcome: u64) -> f64 {
        self.probabilities.get(&outcome).copied().unwrap_or(0.0)
    }

    pub fn shots(&self) -> Option<u64> {
        self.shots
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.probabilities.iter().map(|(k, v)| (*k, *v))
    }

    pub fn total(&self) -> f64 {
        self.probabilities.values().sum()
    }

    /// Keys rendered as bit strings of width `num_bits`, qubit 0 rightmost.
    pub fn binary_probabilities(&self, num_bits: usize) -> BTreeMap<String, f64> {
        self.probabilities
            .iter()
            .map(|(k, v)| (format!("{:0width$b}", k, width = num_bits), *v))
            .collect()
    }
}

impl FromIterator<(u64, f64)> for QuasiDistribution {
    fn from_iter<I: IntoIterator<Item = (u64, f64)>>(iter: I) -> Self {
        let mut probabilities = BTreeMap::new();
        for (k, v) in iter {
            *probabilities.entry(k).or_insert(0.0) += v;
        }
        Self { probabilities, shots: None }
    }
}

impl fmt::Display for QuasiDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}: {v:.6}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
