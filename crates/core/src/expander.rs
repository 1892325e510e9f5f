use crate::error::RagError;
use crate::traits::Generator;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

pub const EXPANSION_TEMPLATE: &str = "You are an AI language model assistant. \
Your task is to generate {count} different versions of the given user question to retrieve relevant documents from a vector database. \
By generating multiple perspectives on the user question, your goal is to help the user overcome some of the distance-based similarity search limitations. \
Provide these alternative questions separated by newlines. Original question: {question}";

/// Rewrites one question into several paraphrases with a single generation
/// call.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    variants: usize,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(variants: usize, timeout: Duration) -> Self {
        Self {
            variants: variants.max(1),
            timeout,
        }
    }

    pub fn prompt(&self, question: &str) -> String {
        EXPANSION_TEMPLATE
            .replace("{count}", &count_word(self.variants))
            .replace("{question}", question)
    }

    /// Paraphrases of `question`, at most the configured count. Fails with
    /// `ExpansionError` when the generator fails or produces nothing usable.
    pub async fn expand<G>(&self, generator: &G, question: &str) -> Result<Vec<String>, RagError>
    where
        G: Generator + Sync + ?Sized,
    {
        if question.trim().is_empty() {
            return Err(RagError::InvalidQuery("question is empty".to_string()));
        }

        let prompt = self.prompt(question);
        let raw = match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(error)) => return Err(RagError::ExpansionError(error.to_string())),
            Err(_) => {
                return Err(RagError::ExpansionError(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
        };

        let mut variants = parse_variants(&raw);
        if variants.is_empty() {
            return Err(RagError::ExpansionError(
                "generator returned no questions".to_string(),
            ));
        }

        if variants.len() != self.variants {
            debug!(expected = self.variants, got = variants.len(), "unexpected variant count");
        }
        variants.truncate(self.variants);
        Ok(variants)
    }

    /// Like `expand`, but degrades to the original question on failure.
    pub async fn expand_or_original<G>(&self, generator: &G, question: &str) -> Vec<String>
    where
        G: Generator + Sync + ?Sized,
    {
        match self.expand(generator, question).await {
            Ok(variants) => variants,
            Err(error) => {
                warn!(%error, "query expansion failed, using the original question");
                vec![question.trim().to_string()]
            }
        }
    }
}

/// One question per non-empty line, list markers stripped, duplicates
/// dropped.
pub fn parse_variants(raw: &str) -> Vec<String> {
    let marker = Regex::new(r"^\s*(?:[-*•]\s+|\d+[.)]\s+|\(\d+\)\s+)").ok();
    let mut variants: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = match &marker {
            Some(re) => re.replace(line, "").into_owned(),
            None => line.to_string(),
        };
        let line = line.trim();
        if line.is_empty() || variants.iter().any(|existing| existing == line) {
            continue;
        }
        variants.push(line.to_string());
    }

    variants
}

fn count_word(count: usize) -> String {
    const WORDS: [&str; 10] = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];
    WORDS
        .get(count.saturating_sub(1))
        .map(|word| word.to_string())
        .unwrap_or_else(|| count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    fn expander() -> QueryExpander {
        QueryExpander::new(5, Duration::from_secs(5))
    }

    #[test]
    fn prompt_names_count_and_question() {
        let prompt = expander().prompt("Who has priority at a roundabout?");
        assert!(prompt.contains("generate five different versions"));
        assert!(prompt.ends_with("Original question: Who has priority at a roundabout?"));
    }

    #[test]
    fn variants_drop_blank_lines_and_markers() {
        let raw = "1. What is the limit?\n\n2) How fast may I drive?\n- Speed cap?\n   \n";
        assert_eq!(
            parse_variants(raw),
            vec!["What is the limit?", "How fast may I drive?", "Speed cap?"]
        );
    }

    #[test]
    fn leading_numbers_inside_questions_are_kept() {
        let raw = "2.5 tonne trucks: where may they park?\n30) is that the limit?\n(3) 50 km/h in towns?";
        assert_eq!(
            parse_variants(raw),
            vec![
                "2.5 tonne trucks: where may they park?",
                "is that the limit?",
                "50 km/h in towns?"
            ]
        );
    }

    #[test]
    fn duplicate_variants_are_removed() {
        assert_eq!(parse_variants("a?\na?\nb?"), vec!["a?", "b?"]);
    }

    #[tokio::test]
    async fn expansion_keeps_at_most_the_configured_count() {
        let generator = ScriptedGenerator::new(vec![Ok("q1\nq2\nq3\nq4\nq5\nq6\nq7".to_string())]);
        let variants = expander().expand(&generator, "speed?").await.unwrap();
        assert_eq!(variants.len(), 5);
        assert_eq!(generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn fewer_variants_are_accepted() {
        let generator = ScriptedGenerator::new(vec![Ok("only one".to_string())]);
        let variants = expander().expand(&generator, "speed?").await.unwrap();
        assert_eq!(variants, vec!["only one"]);
    }

    #[tokio::test]
    async fn empty_output_falls_back_to_original() {
        let generator = ScriptedGenerator::new(vec![Ok("\n  \n".to_string())]);
        let variants = expander()
            .expand_or_original(&generator, " What is a cycle lane? ")
            .await;
        assert_eq!(variants, vec!["What is a cycle lane?"]);
    }

    #[tokio::test]
    async fn generator_failure_is_an_expansion_error() {
        let generator =
            ScriptedGenerator::new(vec![Err(RagError::GenerationError("offline".to_string()))]);
        let result = expander().expand(&generator, "speed?").await;
        assert!(matches!(result, Err(RagError::ExpansionError(_))));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let generator = ScriptedGenerator::new(Vec::new());
        let result = expander().expand(&generator, "   ").await;
        assert!(matches!(result, Err(RagError::InvalidQuery(_))));
        assert!(generator.prompts().is_empty());
    }
}
