//! Paragraph annotation
//!
//! Attaches the detected language to every paragraph and, for the primary
//! language, the named entities found in its text. Both lookups go through
//! collaborator traits so the clustering stage never depends on NLP tooling.

pub mod languages;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{CollaboratorError, CommandSpec};
use crate::config::AnnotationSettings;
use crate::vision::Paragraph;

/// Language reported by an identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Language code (e.g. "en")
    #[serde(alias = "lang")]
    pub code: String,
    /// Human-readable name (e.g. "English")
    #[serde(alias = "lang_name")]
    pub name: String,
}

/// Named entity found in a paragraph.
///
/// Fields other than `text` and `label` are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    #[serde(alias = "type")]
    pub label: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Final per-paragraph output record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedRecord {
    pub text: String,
    pub lang: String,
    pub lang_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<EntitySpan>>,
}

/// Language identification collaborator
pub trait LanguageIdentifier: Send + Sync {
    fn identify(&self, text: &str) -> Result<Language, CollaboratorError>;
}

/// Entity extraction collaborator
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<EntitySpan>, CollaboratorError>;
}

/// Identifier that always reports the same language
#[derive(Debug, Clone)]
pub struct FixedLanguage {
    language: Language,
}

impl FixedLanguage {
    pub fn new(code: &str) -> Self {
        let name = languages::language_name(code).unwrap_or(code);
        Self {
            language: Language {
                code: code.to_string(),
                name: name.to_string(),
            },
        }
    }
}

impl LanguageIdentifier for FixedLanguage {
    fn identify(&self, _text: &str) -> Result<Language, CollaboratorError> {
        Ok(self.language.clone())
    }
}

/// Identifier backed by an external program (text on stdin, JSON on stdout)
pub struct CommandLanguageIdentifier {
    command: CommandSpec,
}

impl CommandLanguageIdentifier {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl LanguageIdentifier for CommandLanguageIdentifier {
    fn identify(&self, text: &str) -> Result<Language, CollaboratorError> {
        self.command.run_with_stdin(text)
    }
}

/// Extractor backed by an external program (text on stdin, JSON array on stdout)
pub struct CommandEntityExtractor {
    command: CommandSpec,
}

impl CommandEntityExtractor {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl EntityExtractor for CommandEntityExtractor {
    fn extract(&self, text: &str) -> Result<Vec<EntitySpan>, CollaboratorError> {
        self.command.run_with_stdin(text)
    }
}

/// Language and entity annotation of paragraphs
pub struct Annotator {
    identifier: Box<dyn LanguageIdentifier>,
    extractor: Option<Box<dyn EntityExtractor>>,
    primary_language: String,
}

impl Annotator {
    pub fn new(
        identifier: Box<dyn LanguageIdentifier>,
        extractor: Option<Box<dyn EntityExtractor>>,
        primary_language: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            extractor,
            primary_language: primary_language.into(),
        }
    }

    /// Build from configuration; `fallback_language` is reported when no
    /// identifier command is configured
    pub fn from_settings(settings: &AnnotationSettings, fallback_language: &str) -> Self {
        let identifier: Box<dyn LanguageIdentifier> = match &settings.language_command {
            Some(command) => Box::new(CommandLanguageIdentifier::new(command.clone())),
            None => Box::new(FixedLanguage::new(fallback_language)),
        };
        let extractor = settings
            .entity_command
            .clone()
            .map(|command| Box::new(CommandEntityExtractor::new(command)) as Box<dyn EntityExtractor>);

        Self::new(identifier, extractor, settings.primary_language.clone())
    }

    /// Annotate paragraphs, dropping those with blank text
    pub fn annotate(&self, paragraphs: &[Paragraph]) -> Result<Vec<AnnotatedRecord>, CollaboratorError> {
        let mut records = Vec::with_capacity(paragraphs.len());

        for paragraph in paragraphs {
            if paragraph.text.trim().is_empty() {
                debug!("Dropping blank paragraph at {:?}", paragraph.bounds);
                continue;
            }
            records.push(self.annotate_text(&paragraph.text)?);
        }

        Ok(records)
    }

    fn annotate_text(&self, text: &str) -> Result<AnnotatedRecord, CollaboratorError> {
        let language = self.identifier.identify(text)?;

        let entities = if language.code == self.primary_language {
            match &self.extractor {
                Some(extractor) => Some(extractor.extract(text)?),
                None => Some(Vec::new()),
            }
        } else {
            None
        };

        Ok(AnnotatedRecord {
            text: text.to_string(),
            lang: language.code,
            lang_name: language.name,
            entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{cluster_paragraphs, ClusterParams, Detection};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Reports French for text containing "le", English otherwise
    struct KeywordIdentifier;

    impl LanguageIdentifier for KeywordIdentifier {
        fn identify(&self, text: &str) -> Result<Language, CollaboratorError> {
            let (code, name) = if text.split_whitespace().any(|w| w == "le") {
                ("fr", "French")
            } else {
                ("en", "English")
            };
            Ok(Language {
                code: code.to_string(),
                name: name.to_string(),
            })
        }
    }

    /// Treats capitalized words as entities and counts calls
    struct CapitalizedExtractor {
        calls: Arc<AtomicUsize>,
    }

    impl EntityExtractor for CapitalizedExtractor {
        fn extract(&self, text: &str) -> Result<Vec<EntitySpan>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text
                .split_whitespace()
                .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
                .map(|w| EntitySpan {
                    text: w.to_string(),
                    label: "PROPER".to_string(),
                    extra: serde_json::Map::new(),
                })
                .collect())
        }
    }

    struct FailingIdentifier;

    impl LanguageIdentifier for FailingIdentifier {
        fn identify(&self, _text: &str) -> Result<Language, CollaboratorError> {
            Err(CollaboratorError::Parse {
                program: "langid".to_string(),
                source: serde_json::from_str::<Language>("{}").unwrap_err(),
            })
        }
    }

    fn paragraph(text: &str) -> Paragraph {
        Paragraph {
            members: vec![],
            bounds: [[0, 0], [10, 0], [10, 10], [0, 10]],
            text: text.to_string(),
        }
    }

    fn annotator(calls: Arc<AtomicUsize>) -> Annotator {
        Annotator::new(
            Box::new(KeywordIdentifier),
            Some(Box::new(CapitalizedExtractor { calls })),
            "en",
        )
    }

    #[test]
    fn test_entities_only_for_primary_language() {
        let calls = Arc::new(AtomicUsize::new(0));
        let records = annotator(calls.clone())
            .annotate(&[paragraph("Visit Paris today"), paragraph("le chat de Marie")])
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lang, "en");
        assert_eq!(records[0].lang_name, "English");
        let entities = records[0].entities.as_ref().unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].text, "Visit");
        assert_eq!(entities[1].text, "Paris");

        assert_eq!(records[1].lang, "fr");
        assert!(records[1].entities.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blank_paragraphs_are_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let records = annotator(calls)
            .annotate(&[paragraph(""), paragraph("   \t"), paragraph("kept")])
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "kept");
    }

    #[test]
    fn test_primary_without_extractor_has_empty_entities() {
        let annotator = Annotator::new(Box::new(FixedLanguage::new("en")), None, "en");
        let records = annotator.annotate(&[paragraph("hello")]).unwrap();
        assert_eq!(records[0].entities, Some(vec![]));
    }

    #[test]
    fn test_identifier_error_propagates() {
        let annotator = Annotator::new(Box::new(FailingIdentifier), None, "en");
        assert!(annotator.annotate(&[paragraph("hello")]).is_err());
    }

    #[test]
    fn test_fixed_language_names() {
        let lang = FixedLanguage::new("de").identify("anything").unwrap();
        assert_eq!(lang.name, "German");

        let lang = FixedLanguage::new("zz").identify("anything").unwrap();
        assert_eq!(lang.name, "zz");
    }

    #[test]
    fn test_record_serialization() {
        let record = AnnotatedRecord {
            text: "Bonjour".to_string(),
            lang: "fr".to_string(),
            lang_name: "French".to_string(),
            entities: None,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({"text": "Bonjour", "lang": "fr", "lang_name": "French"})
        );
    }

    #[test]
    fn test_entity_span_passes_extra_fields_through() {
        let json = r#"{"text": "Paris", "type": "GPE", "start": 6, "end": 11}"#;
        let span: EntitySpan = serde_json::from_str(json).unwrap();
        assert_eq!(span.label, "GPE");
        assert_eq!(span.extra["start"], 6);

        let value = serde_json::to_value(&span).unwrap();
        assert_eq!(value["label"], "GPE");
        assert_eq!(value["end"], 11);
    }

    #[test]
    fn test_language_accepts_aliases() {
        let lang: Language = serde_json::from_str(r#"{"lang": "en", "lang_name": "English"}"#).unwrap();
        assert_eq!(lang.code, "en");
        assert_eq!(lang.name, "English");
    }

    #[test]
    fn test_annotates_clustered_paragraphs() {
        let detections = vec![
            Detection::from_rect(0, 0, 50, 20, "Hello", 0.9),
            Detection::from_rect(60, 0, 50, 20, "World", 0.9),
            Detection::from_rect(0, 100, 50, 20, "New", 0.9),
        ];
        let paragraphs = cluster_paragraphs(
            &detections,
            &ClusterParams {
                x_ths: 0.5,
                y_ths: 0.5,
                ..ClusterParams::default()
            },
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let records = annotator(calls.clone()).annotate(&paragraphs).unwrap();

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello World", "New"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
