use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Functional role of a rule in the voice guide, e.g. "cta" or "dialog-title".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Cta,
    Tooltip,
    Error,
    Helper,
    Label,
    DialogTitle,
    Voice,
    General,
}

/// The functional role of the UI string being rewritten. Shares the rule categories.
pub type Intent = Category;

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Cta,
        Category::Tooltip,
        Category::Error,
        Category::Helper,
        Category::Label,
        Category::DialogTitle,
        Category::Voice,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Cta => "cta",
            Category::Tooltip => "tooltip",
            Category::Error => "error",
            Category::Helper => "helper",
            Category::Label => "label",
            Category::DialogTitle => "dialog-title",
            Category::Voice => "voice",
            Category::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Voice and general rules carry brand-wide tone and apply to every intent.
    pub fn is_brand_wide(self) -> bool {
        matches!(self, Category::Voice | Category::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reader class a rule is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Audience {
    General,
    EndUser,
    ItAdmin,
}

impl Audience {
    pub const ALL: [Audience; 3] = [Audience::General, Audience::EndUser, Audience::ItAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Audience::General => "general",
            Audience::EndUser => "end-user",
            Audience::ItAdmin => "it-admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single atomic piece of style guidance (e.g. "CTA-VERB: Start with a verb").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    /// Stable identifier cited by generated variants, e.g. "CTA-VERB"
    pub id: String,
    pub category: Category,
    /// Readers this rule applies to; `general` applies to everyone
    pub audience: BTreeSet<Audience>,
    /// Guidance text rendered into the prompt
    pub text: String,
}

impl Rule {
    pub fn applies_to(&self, audience: Audience) -> bool {
        self.audience.contains(&audience) || self.audience.contains(&Audience::General)
    }
}

/// One candidate rewrite plus the justification for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub text: String,
    pub rationale: String,
    /// Rule ids the generator says it followed, verbatim
    pub applied_rules: Vec<String>,
}

/// Exactly three variants, produced all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSet([Variant; 3]);

impl VariantSet {
    pub const LEN: usize = 3;

    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Variant> {
        self.0.into()
    }
}

impl TryFrom<Vec<Variant>> for VariantSet {
    type Error = Vec<Variant>;

    fn try_from(variants: Vec<Variant>) -> Result<Self, Self::Error> {
        <[Variant; 3]>::try_from(variants).map(Self)
    }
}

/// One applied text recorded against a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub text: String,
    pub applied_at: DateTime<Utc>,
    pub dataset_version: String,
}

/// Which path produced a `VariantSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Remote,
    Fallback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_round_trip_through_serde() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("Dialog-Title"), None);
    }

    #[test]
    fn general_audience_rules_apply_to_everyone() {
        let rule = Rule {
            id: "VOICE-PLAIN".to_string(),
            category: Category::Voice,
            audience: BTreeSet::from([Audience::General]),
            text: "Use plain words.".to_string(),
        };
        for audience in Audience::ALL {
            assert!(rule.applies_to(audience));
        }

        let admin_only = Rule {
            audience: BTreeSet::from([Audience::ItAdmin]),
            ..rule
        };
        assert!(admin_only.applies_to(Audience::ItAdmin));
        assert!(!admin_only.applies_to(Audience::EndUser));
        assert!(!admin_only.applies_to(Audience::General));
    }

    #[test]
    fn variant_set_requires_exactly_three() {
        let v = Variant {
            text: "Start".to_string(),
            rationale: "Short".to_string(),
            applied_rules: vec![],
        };
        assert!(VariantSet::try_from(vec![v.clone(), v.clone()]).is_err());
        let set = VariantSet::try_from(vec![v.clone(), v.clone(), v]).unwrap();
        assert_eq!(set.iter().count(), VariantSet::LEN);
    }
}
