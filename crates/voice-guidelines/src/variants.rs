/// Parses a generation response into exactly three variants.
///
/// The response must be a bare JSON object. Missing `appliedRules` defaults to empty;
/// every other deviation, a Markdown code fence included, is a `ParseError`. Field values
/// are kept verbatim and cited rule ids are not checked against the corpus here.
use serde::Deserialize;

use crate::error::ParseError;
use crate::model::{Variant, VariantSet};

#[derive(Debug, Deserialize)]
struct RawResponse {
    variants: Option<Vec<RawVariant>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariant {
    #[serde(default)]
    text: String,
    #[serde(default)]
    rationale: String,
    #[serde(default, alias = "applied_rules")]
    applied_rules: Vec<String>,
}

pub fn parse_variants(raw: &str) -> Result<VariantSet, ParseError> {
    let response: RawResponse = serde_json::from_str(raw)?;
    let raw_variants = response.variants.ok_or(ParseError::MissingVariants)?;

    if raw_variants.len() != VariantSet::LEN {
        return Err(ParseError::WrongCount {
            expected: VariantSet::LEN,
            actual: raw_variants.len(),
        });
    }

    let variants = raw_variants
        .into_iter()
        .enumerate()
        .map(|(index, v)| to_variant(index, v))
        .collect::<Result<Vec<_>, _>>()?;

    VariantSet::try_from(variants).map_err(|v| ParseError::WrongCount {
        expected: VariantSet::LEN,
        actual: v.len(),
    })
}

fn to_variant(index: usize, raw: RawVariant) -> Result<Variant, ParseError> {
    if raw.text.trim().is_empty() {
        return Err(ParseError::EmptyField { index, field: "text" });
    }
    if raw.rationale.trim().is_empty() {
        return Err(ParseError::EmptyField {
            index,
            field: "rationale",
        });
    }
    Ok(Variant {
        text: raw.text,
        rationale: raw.rationale,
        applied_rules: raw.applied_rules,
    })
}
