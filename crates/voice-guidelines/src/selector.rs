/// Rule selection: maps an (intent, audience) pair to a bounded, duplicate-free rule list.
///
/// Order is relevance rank: the intent's own rules first, then brand-wide voice and
/// general rules. When the bound is hit, intent rules are cut first, down to one: a
/// corpus with more brand-wide rules than slots still leaves the intent one rule.
use std::collections::HashSet;
use std::sync::Arc;

use crate::model::{Audience, Intent, Rule};
use crate::repository::RuleIndex;

pub const DEFAULT_MAX_RULES: usize = 6;

#[derive(Debug, Clone)]
pub struct RuleSelector {
    index: Arc<RuleIndex>,
    max_rules: usize,
}

impl RuleSelector {
    pub fn new(index: Arc<RuleIndex>, max_rules: usize) -> Self {
        Self {
            index,
            max_rules: max_rules.max(1),
        }
    }

    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    pub fn select(&self, intent: Intent, audience: Audience) -> Vec<&Rule> {
        let mut brand_ids: HashSet<&str> = HashSet::new();
        let brand: Vec<&Rule> = self
            .index
            .brand_rules()
            .into_iter()
            .filter(|r| brand_ids.insert(r.id.as_str()))
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let intent_rules: Vec<&Rule> = self
            .index
            .rules_for_audience(intent, audience)
            .into_iter()
            .filter(|r| !brand_ids.contains(r.id.as_str()) && seen.insert(r.id.as_str()))
            .collect();

        // One slot stays with the intent whenever it has rules of its own.
        let brand_cap = if intent_rules.is_empty() || self.max_rules == 1 {
            self.max_rules
        } else {
            self.max_rules - 1
        };
        let brand_len = brand.len().min(brand_cap);

        let mut selected: Vec<&Rule> = intent_rules
            .into_iter()
            .take(self.max_rules - brand_len)
            .collect();
        selected.extend(brand.into_iter().take(brand_len));
        selected
    }
}
