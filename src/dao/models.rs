use serde::{Deserialize, Serialize};

/// Question as stored in the question bank file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntity {
    /// Prompt text.
    pub question: String,
    /// Ordered candidate answers.
    pub possible_answers: Vec<String>,
    /// 0-based index of the correct entry in `possible_answers`.
    pub correct_answer: usize,
}
