/// Deterministic, network-free variant generator used when generation fails.
///
/// Applies light case, whitespace, and punctuation passes to the original text. The
/// result depends only on the input, so the same text always yields the same variants.
use crate::model::{Variant, VariantSet};

/// Every fallback rationale starts with this marker.
pub const FALLBACK_RATIONALE_PREFIX: &str = "Offline fallback";

const TRAILING_PUNCTUATION: &[char] = &['.', '!', '?', ',', ';', ':', '…'];
const EMPTY_PLACEHOLDER: &str = "Untitled";

pub fn fallback_variants(original_text: &str) -> VariantSet {
    let original = original_text.trim();
    let mut base = strip_trailing_punctuation(&collapse_whitespace(original));
    if base.is_empty() {
        base = EMPTY_PLACEHOLDER.to_string();
    }

    let sentence = sentence_case(&base);
    let passes = [
        ("sentence case, trailing punctuation removed", sentence.clone()),
        ("sentence case with a closing period", format!("{sentence}.")),
        ("title case", title_case(&base)),
        ("lower case", base.to_lowercase()),
        ("upper case", base.to_uppercase()),
    ];

    let mut variants: Vec<Variant> = Vec::with_capacity(VariantSet::LEN);
    for (label, text) in passes {
        if variants.len() == VariantSet::LEN {
            break;
        }
        if text == original || variants.iter().any(|v| v.text == text) {
            continue;
        }
        variants.push(offline_variant(text, label));
    }

    let mut n = 2;
    while variants.len() < VariantSet::LEN {
        let text = format!("{sentence} ({n})");
        if text != original && !variants.iter().any(|v| v.text == text) {
            variants.push(offline_variant(text, "numbered alternative"));
        }
        n += 1;
    }

    match VariantSet::try_from(variants) {
        Ok(set) => set,
        Err(_) => unreachable!("fallback always produces exactly three variants"),
    }
}

fn offline_variant(text: String, label: &str) -> Variant {
    Variant {
        text,
        rationale: format!(
            "{FALLBACK_RATIONALE_PREFIX}: {label}. The generation service was unavailable, \
so no style rules were applied."
        ),
        applied_rules: Vec::new(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_trailing_punctuation(s: &str) -> String {
    s.trim_end_matches(TRAILING_PUNCTUATION).trim_end().to_string()
}

/// Capitalizes the first word and lowercases Title-cased words after it. All-caps
/// words are treated as acronyms and kept.
fn sentence_case(s: &str) -> String {
    s.split(' ')
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                capitalize(word)
            } else if is_title_cased(word) {
                word.to_lowercase()
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(s: &str) -> String {
    s.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_title_cased(word: &str) -> bool {
    let mut chars = word.chars().filter(|c| c.is_alphabetic());
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            let rest: Vec<char> = chars.collect();
            !rest.is_empty() && rest.iter().all(|c| c.is_lowercase())
        }
        _ => false,
    }
}
