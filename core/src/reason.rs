//! Reason resolver: picks the single dominant adverse-event reason.
//!
//! Ordering (strict total order):
//!   1. occurrence count, descending
//!   2. configured priority rank, most severe first
//!   3. codes absent from the priority list rank last, lexicographically
//!
//! Insertion order of the input never influences the result.

use crate::{
    entity::EventReason,
    error::ConfigError,
    types::ReasonCode,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum DominantReason {
    NoEvents,
    Reason(ReasonCode),
}

impl DominantReason {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::NoEvents     => None,
            Self::Reason(code) => Some(code),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReasonResolver {
    ranks: HashMap<ReasonCode, usize>,
    len:   usize,
}

impl ReasonResolver {
    /// Build from a priority list, most severe first.
    pub fn new(priority: &[ReasonCode]) -> Result<Self, ConfigError> {
        if priority.is_empty() {
            return Err(ConfigError::EmptyPriorityList);
        }
        let mut ranks = HashMap::with_capacity(priority.len());
        for (rank, code) in priority.iter().enumerate() {
            if code.trim().is_empty() {
                return Err(ConfigError::EmptyReasonCode);
            }
            if ranks.insert(code.clone(), rank).is_some() {
                return Err(ConfigError::DuplicateReasonCode { code: code.clone() });
            }
        }
        Ok(Self { ranks, len: priority.len() })
    }

    /// Rank of a code, 0 = most severe. Unknown codes have no rank.
    pub fn rank(&self, code: &str) -> Option<usize> {
        self.ranks.get(code).copied()
    }

    /// Severity of a resolved reason: `len` for the most severe known code
    /// down to 1 for the least severe; 0 for unknown codes and `NoEvents`.
    pub fn severity(&self, reason: &DominantReason) -> u32 {
        reason
            .code()
            .and_then(|c| self.rank(c))
            .map(|rank| (self.len - rank) as u32)
            .unwrap_or(0)
    }

    pub fn resolve(&self, reasons: &[EventReason]) -> DominantReason {
        // Merge duplicate codes; BTreeMap keeps the merge independent of input order.
        let mut merged: BTreeMap<&str, u64> = BTreeMap::new();
        for r in reasons.iter().filter(|r| r.count > 0) {
            let total = merged.entry(r.reason_code.as_str()).or_insert(0);
            *total = total.saturating_add(r.count);
        }

        if merged.len() == 1 {
            if let Some(code) = merged.keys().next() {
                return DominantReason::Reason(code.to_string());
            }
        }

        let top = merged.iter().min_by(|(code_a, count_a), (code_b, count_b)| {
            count_b
                .cmp(count_a)
                .then_with(|| {
                    let rank_a = self.rank(code_a).unwrap_or(usize::MAX);
                    let rank_b = self.rank(code_b).unwrap_or(usize::MAX);
                    rank_a.cmp(&rank_b)
                })
                .then_with(|| code_a.cmp(code_b))
        });

        match top {
            None => DominantReason::NoEvents,
            Some((code, count)) => {
                let tied_unknown = merged
                    .iter()
                    .filter(|(_, c)| *c == count)
                    .filter(|(k, _)| self.rank(k).is_none())
                    .count();
                if tied_unknown > 0 && merged.values().filter(|c| *c == count).count() > 1 {
                    log::warn!(
                        "Reason tie at count {count} involves {tied_unknown} code(s) outside the \
                         priority list; resolved to '{code}' by fallback order"
                    );
                }
                DominantReason::Reason(code.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ReasonResolver {
        ReasonResolver::new(&["fraudulent".into(), "unauthorized".into(), "duplicate".into()]).unwrap()
    }

    #[test]
    fn rejects_duplicate_codes() {
        let err = ReasonResolver::new(&["a".into(), "a".into()]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateReasonCode { code: "a".into() });
    }

    #[test]
    fn rejects_empty_list() {
        assert_eq!(ReasonResolver::new(&[]).unwrap_err(), ConfigError::EmptyPriorityList);
    }

    #[test]
    fn severity_descends_with_rank() {
        let r = resolver();
        assert_eq!(r.severity(&DominantReason::Reason("fraudulent".into())), 3);
        assert_eq!(r.severity(&DominantReason::Reason("duplicate".into())), 1);
        assert_eq!(r.severity(&DominantReason::Reason("other".into())), 0);
        assert_eq!(r.severity(&DominantReason::NoEvents), 0);
    }

    #[test]
    fn duplicate_input_codes_are_merged() {
        let r = resolver();
        let input = vec![
            EventReason::new("duplicate", 2),
            EventReason::new("fraudulent", 3),
            EventReason::new("duplicate", 2),
        ];
        assert_eq!(r.resolve(&input), DominantReason::Reason("duplicate".into()));
    }

    #[test]
    fn zero_counts_are_not_events() {
        let r = resolver();
        assert_eq!(r.resolve(&[EventReason::new("fraudulent", 0)]), DominantReason::NoEvents);
    }
}
