//! Batch evaluation: run a table of questions through a session and record
//! the answers next to the expected ones.

use crate::error::RagError;
use crate::session::ChatSession;
use crate::traits::{Embedder, Generator, VectorIndex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;

pub const ERROR_PREFIX: &str = "Error processing query:";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    pub question: String,
    pub expected_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRow {
    pub question_id: usize,
    pub question: String,
    pub expected_answer: String,
    pub actual_answer: String,
    pub response_time_seconds: f64,
}

impl EvaluationRow {
    pub fn failed(&self) -> bool {
        self.actual_answer.starts_with(ERROR_PREFIX)
    }
}

#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub rows: Vec<EvaluationRow>,
}

impl EvaluationReport {
    pub fn average_response_time(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(|row| row.response_time_seconds).sum::<f64>() / self.rows.len() as f64
    }

    pub fn failures(&self) -> usize {
        self.rows.iter().filter(|row| row.failed()).count()
    }
}

/// Reads `question,expected_answer` rows from a headerless CSV file.
pub fn read_test_cases(path: &Path) -> Result<Vec<TestCase>, RagError> {
    if !path.exists() {
        return Err(RagError::Evaluation(format!(
            "test case file not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut cases = Vec::new();
    for record in reader.deserialize::<TestCase>() {
        cases.push(record?);
    }
    Ok(cases)
}

pub fn write_results(path: &Path, rows: &[EvaluationRow]) -> Result<(), RagError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Runs every case in order. A failed exchange is recorded with an error
/// text as its answer instead of stopping the run.
pub async fn run_evaluation<E, V, G, F>(
    session: &mut ChatSession<E, V, G>,
    cases: &[TestCase],
    mut on_progress: F,
) -> EvaluationReport
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    G: Generator + Send + Sync,
    F: FnMut(usize, usize),
{
    let mut report = EvaluationReport::default();

    for (position, case) in cases.iter().enumerate() {
        let started = Instant::now();
        let actual_answer = match session.process_query(&case.question).await {
            Ok(answer) => answer.text,
            Err(error) => format!("{ERROR_PREFIX} {error}"),
        };

        report.rows.push(EvaluationRow {
            question_id: position + 1,
            question: case.question.clone(),
            expected_answer: case.expected_answer.clone(),
            actual_answer,
            response_time_seconds: started.elapsed().as_secs_f64(),
        });
        on_progress(position + 1, cases.len());
    }

    info!(
        questions = report.rows.len(),
        failures = report.failures(),
        average_seconds = report.average_response_time(),
        "evaluation finished"
    );
    report
}
