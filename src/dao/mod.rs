/// Stored representation of questions.
pub mod models;
/// Question bank loaders.
pub mod question_bank;
/// Storage error types shared by loaders.
pub mod storage;
