use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinsightError {
    #[error("unrecognized date expression: {0}")]
    DateParse(String),

    #[error("malformed category encoding: {0}")]
    CategoryDecode(String),
}
