use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("loan limit reached ({max} books)")]
    LimitExceeded { max: i64 },

    #[error("loan duration {requested} exceeds the maximum of {max} days")]
    InvalidDuration { requested: i64, max: i64 },

    #[error("book not found")]
    BookNotFound,

    #[error("book is out of stock")]
    OutOfStock,

    #[error("loan not found")]
    NotFound,

    #[error("loan already returned")]
    AlreadyReturned,

    #[error("loan is overdue and cannot be extended")]
    Overdue,

    #[error("loan belongs to another user")]
    Forbidden,

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type LoanResult<T> = Result<T, LoanError>;
