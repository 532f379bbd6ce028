//! Card catalog loading and validation.
//!
//! Datasets are JSON arrays of authored cards. Each card gets a stable id
//! derived from its unit, subtopic and prompt, so re-seeding the same dataset
//! never orphans learner progress.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{Card, ChoiceKey};

const CARD_TYPES: [&str; 3] = ["revision", "error_id", "best_choice"];
const MIN_DIFFICULTY: i64 = 1;
const MAX_DIFFICULTY: i64 = 3;

/// A card as written by the content pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoredCard {
    pub unit: String,
    pub subtopic: String,
    pub prompt: String,
    #[serde(default)]
    pub choices: BTreeMap<String, String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: i64,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_difficulty() -> i64 {
    1
}

impl AuthoredCard {
    /// Stable id: `card_` + first 24 hex digits of SHA-256(unit \n subtopic \n prompt).
    pub fn card_id(&self) -> String {
        derive_card_id(&self.unit, &self.subtopic, &self.prompt)
    }

    /// Convert into a catalog card.
    ///
    /// Fails unless the choices are exactly A-D with distinct, non-empty
    /// texts and the answer names one of them.
    pub fn into_card(self) -> Result<Card> {
        let id = self.card_id();
        let choices = self
            .choices
            .iter()
            .map(|(key, text)| {
                let key: ChoiceKey = key.parse().map_err(|e: String| anyhow::anyhow!(e))?;
                Ok((key, text.trim().to_string()))
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .with_context(|| format!("card {id} has a malformed choice key"))?;
        anyhow::ensure!(
            choices.len() == ChoiceKey::ALL.len(),
            "card {id}: expected choices A, B, C, D, found {}",
            choices.len()
        );
        let texts: HashSet<&str> = choices.values().map(String::as_str).collect();
        anyhow::ensure!(
            texts.len() == choices.len() && !texts.contains(""),
            "card {id}: choices must be distinct, non-empty texts"
        );

        let correct_choice: ChoiceKey = self
            .correct_answer
            .parse()
            .map_err(|e: String| anyhow::anyhow!("card {id}: {e}"))?;
        anyhow::ensure!(
            choices.contains_key(&correct_choice),
            "card {id}: correct answer {correct_choice} is not one of its choices"
        );

        let difficulty = u8::try_from(self.difficulty.max(MIN_DIFFICULTY))
            .with_context(|| format!("card {id}: difficulty out of range"))?;

        Ok(Card {
            id,
            unit_id: self.unit.trim().to_string(),
            subtopic: self.subtopic.trim().to_string(),
            prompt: self.prompt.trim().to_string(),
            choices,
            correct_choice,
            explanation: self.explanation.trim().to_string(),
            difficulty,
        })
    }
}

/// Derive the stable card id from its identifying text.
pub fn derive_card_id(unit: &str, subtopic: &str, prompt: &str) -> String {
    let digest = Sha256::digest(format!("{unit}\n{subtopic}\n{prompt}").as_bytes());
    let hex = hex::encode(digest);
    format!("card_{}", &hex[..24])
}

/// The full, immutable set of cards, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    cards: Vec<Card>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog. Later duplicates of an id are dropped.
    pub fn new(cards: Vec<Card>) -> Self {
        let mut kept = Vec::with_capacity(cards.len());
        let mut index = HashMap::with_capacity(cards.len());
        for card in cards {
            if index.contains_key(&card.id) {
                tracing::warn!("dropping duplicate card {}", card.id);
                continue;
            }
            index.insert(card.id.clone(), kept.len());
            kept.push(card);
        }
        Self { cards: kept, index }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, card_id: &str) -> Option<&Card> {
        self.index.get(card_id).map(|&i| &self.cards[i])
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn has_unit(&self, unit_id: &str) -> bool {
        self.cards.iter().any(|c| c.unit_id == unit_id)
    }

    /// Distinct unit ids, sorted.
    pub fn unit_ids(&self) -> Vec<&str> {
        let mut units: Vec<&str> = self.cards.iter().map(|c| c.unit_id.as_str()).collect();
        units.sort_unstable();
        units.dedup();
        units
    }
}

/// Parse a JSON dataset file into authored cards.
pub fn parse_dataset(path: &Path) -> Result<Vec<AuthoredCard>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset file: {}", path.display()))?;

    parse_dataset_str(&content, path)
}

/// Parse a JSON string into authored cards (useful for testing).
pub fn parse_dataset_str(content: &str, source_path: &Path) -> Result<Vec<AuthoredCard>> {
    serde_json::from_str(content)
        .with_context(|| format!("failed to parse dataset JSON: {}", source_path.display()))
}

/// Recursively load all `.json` datasets from a directory.
pub fn load_dataset_directory(dir: &Path) -> Result<Vec<AuthoredCard>> {
    let mut cards = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            cards.extend(load_dataset_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match parse_dataset(&path) {
                Ok(parsed) => cards.extend(parsed),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(cards)
}

/// Load authored cards from a file or a directory of files.
pub fn load_dataset(path: &Path) -> Result<Vec<AuthoredCard>> {
    if path.is_dir() {
        load_dataset_directory(path)
    } else {
        parse_dataset(path)
    }
}

/// Load a file or directory straight into a `Catalog`.
///
/// Cards that cannot be converted are skipped with a warning.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let cards: Vec<Card> = load_dataset(path)?
        .into_iter()
        .filter_map(|authored| match authored.into_card() {
            Ok(card) => Some(card),
            Err(e) => {
                tracing::warn!("skipping card in {}: {:#}", path.display(), e);
                None
            }
        })
        .collect();
    tracing::debug!("loaded {} cards from {}", cards.len(), path.display());
    Ok(Catalog::new(cards))
}

/// A warning from dataset validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Position of the card in the dataset.
    pub index: usize,
    /// Derived id of the card.
    pub card_id: String,
    /// Warning message.
    pub message: String,
}

/// Validate authored cards for content problems.
pub fn validate_dataset(cards: &[AuthoredCard]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut seen_ids = HashSet::new();

    for (index, card) in cards.iter().enumerate() {
        let card_id = card.card_id();
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                index,
                card_id: card_id.clone(),
                message,
            })
        };

        if !seen_ids.insert(card_id.clone()) {
            warn(format!("duplicate card id: {card_id}"));
        }

        for (field, value) in [
            ("unit", &card.unit),
            ("subtopic", &card.subtopic),
            ("prompt", &card.prompt),
            ("explanation", &card.explanation),
        ] {
            if value.trim().is_empty() {
                warn(format!("{field} must be a non-empty string"));
            }
        }

        let keys: Vec<Option<ChoiceKey>> =
            card.choices.keys().map(|k| k.parse().ok()).collect();
        let parsed_keys: HashSet<ChoiceKey> = keys.iter().flatten().copied().collect();
        if keys.len() != ChoiceKey::ALL.len() || parsed_keys.len() != ChoiceKey::ALL.len() {
            warn("choices must have exactly the keys A, B, C, D".into());
        }

        let texts: Vec<&str> = card.choices.values().map(|t| t.trim()).collect();
        if texts.iter().any(|t| t.is_empty()) {
            warn("choices must be non-empty strings".into());
        } else {
            let distinct: HashSet<&str> = texts.iter().copied().collect();
            if distinct.len() != texts.len() {
                warn("choices must contain distinct option texts".into());
            }
        }

        match card.correct_answer.parse::<ChoiceKey>() {
            Err(_) => warn("correct_answer must be one of: A, B, C, D".into()),
            Ok(key) if !parsed_keys.contains(&key) => {
                warn("correct_answer does not reference an existing choice".into())
            }
            Ok(_) => {}
        }

        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&card.difficulty) {
            warn(format!(
                "difficulty must be an integer between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}"
            ));
        }

        if let Some(card_type) = &card.card_type {
            if !CARD_TYPES.contains(&card_type.as_str()) {
                warn(format!(
                    "card_type must be one of: {}",
                    CARD_TYPES.join(", ")
                ));
            }
        }

        if card.tags.iter().any(|t| t.trim().is_empty()) {
            warn("tags must be non-empty strings".into());
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_JSON: &str = r#"[
  {
    "unit": "punctuation",
    "subtopic": "commas",
    "card_type": "best_choice",
    "prompt": "Choose the correctly punctuated sentence.",
    "choices": {
      "A": "However we left.",
      "B": "However, we left.",
      "C": "However; we left.",
      "D": "However: we left."
    },
    "correct_answer": "B",
    "explanation": "Introductory adverbs take a comma.",
    "difficulty": 1,
    "tags": ["commas"]
  }
]"#;

    #[test]
    fn parse_valid_dataset() {
        let cards = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap();
        assert_eq!(cards.len(), 1);
        assert!(validate_dataset(&cards).is_empty());

        let card = cards[0].clone().into_card().unwrap();
        assert!(card.id.starts_with("card_"));
        assert_eq!(card.id.len(), "card_".len() + 24);
        assert_eq!(card.correct_choice, ChoiceKey::B);
        assert_eq!(card.unit_id, "punctuation");
    }

    #[test]
    fn card_id_is_stable() {
        let a = derive_card_id("u", "s", "p");
        let b = derive_card_id("u", "s", "p");
        let c = derive_card_id("u", "s", "q");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn into_card_rejects_unknown_answer() {
        let mut cards = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap();
        cards[0].correct_answer = "E".into();
        assert!(cards[0].clone().into_card().is_err());
        let warnings = validate_dataset(&cards);
        assert!(warnings.iter().any(|w| w.message.contains("correct_answer")));
    }

    #[test]
    fn validate_reports_content_problems() {
        let mut cards = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap();
        let mut dupe = cards[0].clone();
        dupe.choices.insert("C".into(), "However, we left.".into());
        dupe.difficulty = 7;
        dupe.card_type = Some("essay".into());
        dupe.explanation = "  ".into();
        cards.push(dupe);

        let warnings = validate_dataset(&cards);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate card id")));
        assert!(messages.iter().any(|m| m.contains("distinct")));
        assert!(messages.iter().any(|m| m.contains("difficulty")));
        assert!(messages.iter().any(|m| m.contains("card_type")));
        assert!(messages.iter().any(|m| m.contains("explanation")));
        assert!(warnings.iter().all(|w| w.index == 1));
    }

    #[test]
    fn validate_missing_choice_key() {
        let mut cards = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap();
        cards[0].choices.remove("D");
        let warnings = validate_dataset(&cards);
        assert!(warnings.iter().any(|w| w.message.contains("exactly the keys")));
    }

    #[test]
    fn lowercase_keys_validate_and_load() {
        let mut cards = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap();
        cards[0].correct_answer = "b".into();
        assert!(validate_dataset(&cards).is_empty());

        let text = cards[0].choices.remove("C").unwrap();
        cards[0].choices.insert("c".into(), text);
        assert!(validate_dataset(&cards).is_empty());
        let card = cards[0].clone().into_card().unwrap();
        assert_eq!(card.correct_choice, ChoiceKey::B);
        assert_eq!(card.choices.len(), 4);
    }

    #[test]
    fn into_card_requires_four_distinct_choices() {
        let cards = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap();

        let mut three = cards[0].clone();
        three.choices.remove("D");
        let err = three.into_card().unwrap_err();
        assert!(err.to_string().contains("expected choices A, B, C, D"));

        let mut repeated = cards[0].clone();
        repeated.choices.insert("D".into(), " However, we left. ".into());
        let err = repeated.into_card().unwrap_err();
        assert!(err.to_string().contains("distinct"));

        let mut blank = cards[0].clone();
        blank.choices.insert("A".into(), "  ".into());
        assert!(blank.into_card().is_err());
    }

    #[test]
    fn load_catalog_skips_malformed_cards() {
        let dir = tempfile::tempdir().unwrap();
        let mut cards = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap();
        let mut short = cards[0].clone();
        short.prompt = "Pick one.".into();
        short.choices.remove("D");
        cards.push(short);
        let path = dir.path().join("cards.json");
        std::fs::write(&path, serde_json::to_string(&cards).unwrap()).unwrap();

        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.cards()[0].prompt, "Choose the correctly punctuated sentence.");
    }

    #[test]
    fn parse_malformed_json() {
        let result = parse_dataset_str("{ not json", &PathBuf::from("bad.json"));
        assert!(result.is_err());
    }

    #[test]
    fn catalog_drops_duplicate_ids() {
        let card = parse_dataset_str(VALID_JSON, &PathBuf::from("cards.json")).unwrap()[0]
            .clone()
            .into_card()
            .unwrap();
        let catalog = Catalog::new(vec![card.clone(), card.clone()]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(&card.id), Some(&card));
        assert!(catalog.has_unit("punctuation"));
        assert!(!catalog.has_unit("verbs"));
        assert_eq!(catalog.unit_ids(), vec!["punctuation"]);
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), VALID_JSON).unwrap();
        std::fs::write(dir.path().join("broken.json"), "nope").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = load_catalog(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
