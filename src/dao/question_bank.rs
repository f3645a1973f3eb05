use std::path::PathBuf;

use futures::{FutureExt, future::BoxFuture};
use tracing::info;

use crate::{
    dao::{
        models::QuestionEntity,
        storage::{StorageError, StorageResult},
    },
    state::game::Question,
};

/// Source of the ordered question sequence shared by every session.
pub trait QuestionBank: Send + Sync {
    /// Load the full question list. Called once when the registry is built.
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>>;
}

/// Question bank backed by a JSON file (array of [`QuestionEntity`]).
#[derive(Debug, Clone)]
pub struct JsonQuestionBank {
    path: PathBuf,
}

impl JsonQuestionBank {
    /// Point the loader at a JSON file on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuestionBank for JsonQuestionBank {
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>> {
        let path = self.path.clone();
        async move {
            let contents = tokio::fs::read_to_string(&path).await.map_err(|err| {
                StorageError::unavailable(format!("reading `{}`", path.display()), err)
            })?;
            let entities: Vec<QuestionEntity> =
                serde_json::from_str(&contents).map_err(|err| {
                    StorageError::unavailable(format!("parsing `{}`", path.display()), err)
                })?;

            let questions = validate_questions(entities)?;
            info!(path = %path.display(), count = questions.len(), "loaded question bank");
            Ok(questions)
        }
        .boxed()
    }
}

/// In-memory question bank, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticQuestionBank {
    questions: Vec<Question>,
}

impl StaticQuestionBank {
    /// Serve the provided questions as-is.
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }
}

impl QuestionBank for StaticQuestionBank {
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<Question>>> {
        let entities = self.questions.iter().cloned().map(Into::into).collect();
        async move { validate_questions(entities) }.boxed()
    }
}

/// Reject banks that could never produce a playable game.
fn validate_questions(entities: Vec<QuestionEntity>) -> StorageResult<Vec<Question>> {
    if entities.is_empty() {
        return Err(StorageError::Invalid(
            "question bank must contain at least one question".into(),
        ));
    }

    entities
        .into_iter()
        .enumerate()
        .map(|(index, entity)| {
            if entity.possible_answers.is_empty() {
                return Err(StorageError::Invalid(format!(
                    "question #{index} has no possible answers"
                )));
            }
            if entity.correct_answer >= entity.possible_answers.len() {
                return Err(StorageError::Invalid(format!(
                    "question #{index} points at answer {} but only has {} options",
                    entity.correct_answer,
                    entity.possible_answers.len()
                )));
            }
            Ok(entity.into())
        })
        .collect()
}
