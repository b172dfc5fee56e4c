/// Guideline repository: loads and indexes the versioned voice-and-tone corpus.
///
/// Corpus format (JSON):
///
/// ```json
/// { "datasetVersion": "v1.3",
///   "rules": [ { "id": "CTA-VERB", "category": "cta", "audience": ["end-user"], "text": "..." } ] }
/// ```
///
/// The index is immutable once built and is shared as `Arc<RuleIndex>`.
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::LoadError;
use crate::model::{Audience, Category, Rule};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCorpus {
    dataset_version: Option<String>,
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    id: Option<String>,
    category: String,
    #[serde(default)]
    audience: Vec<String>,
    #[serde(default)]
    text: String,
}

#[derive(Debug)]
pub struct RuleIndex {
    dataset_version: String,
    rules: Vec<Rule>,
    by_id: HashMap<String, usize>,
    fingerprint: String,
}

impl RuleIndex {
    pub fn load_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load(&content)
    }

    /// Parse and validate a corpus. Rules keep their corpus order.
    pub fn load(corpus: &str) -> Result<Self, LoadError> {
        let raw: RawCorpus = serde_json::from_str(corpus)?;

        let dataset_version = raw
            .dataset_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(LoadError::MissingVersion)?;

        let mut rules = Vec::with_capacity(raw.rules.len());
        let mut by_id = HashMap::with_capacity(raw.rules.len());

        for (index, raw_rule) in raw.rules.into_iter().enumerate() {
            let rule = validate_rule(index, raw_rule)?;
            if by_id.contains_key(&rule.id) {
                return Err(LoadError::DuplicateId(rule.id));
            }
            by_id.insert(rule.id.clone(), rules.len());
            rules.push(rule);
        }

        let fingerprint = fingerprint(&dataset_version, &rules);
        Ok(Self {
            dataset_version,
            rules,
            by_id,
            fingerprint,
        })
    }

    pub fn dataset_version(&self) -> &str {
        &self.dataset_version
    }

    /// Hex SHA-256 of the validated corpus. Equal corpora produce equal fingerprints.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.by_id.get(id).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn rules_for(&self, category: Category) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.category == category).collect()
    }

    pub fn rules_for_audience(&self, category: Category, audience: Audience) -> Vec<&Rule> {
        self.rules_for(category)
            .into_iter()
            .filter(|r| r.applies_to(audience))
            .collect()
    }

    /// Brand-wide tone rules (`voice` and `general`) in corpus order, for every audience.
    pub fn brand_rules(&self) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.category.is_brand_wide())
            .collect()
    }
}

fn validate_rule(index: usize, raw: RawRule) -> Result<Rule, LoadError> {
    let id = raw
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(LoadError::MissingId { index })?;

    let category = Category::parse(raw.category.trim()).ok_or_else(|| LoadError::UnknownCategory {
        id: id.clone(),
        category: raw.category.clone(),
    })?;

    let mut audience = BTreeSet::new();
    for value in &raw.audience {
        let parsed = Audience::parse(value.trim()).ok_or_else(|| LoadError::UnknownAudience {
            id: id.clone(),
            audience: value.clone(),
        })?;
        audience.insert(parsed);
    }
    if audience.is_empty() {
        audience.insert(Audience::General);
    }

    let text = raw.text.trim().to_string();
    if text.is_empty() {
        return Err(LoadError::EmptyText { id });
    }

    Ok(Rule {
        id,
        category,
        audience,
        text,
    })
}

fn fingerprint(dataset_version: &str, rules: &[Rule]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dataset_version.as_bytes());
    for rule in rules {
        hasher.update(b"\n");
        hasher.update(rule.id.as_bytes());
        hasher.update(b"|");
        hasher.update(rule.category.as_str().as_bytes());
        for audience in &rule.audience {
            hasher.update(b"|");
            hasher.update(audience.as_str().as_bytes());
        }
        hasher.update(b"|");
        hasher.update(rule.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
