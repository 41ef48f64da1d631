use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid amount")]
    InvalidAmount,
    #[error("account not found")]
    AccountNotFound,
    #[error("account already exists")]
    AlreadyExists,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("storage failure")]
    Storage,
    #[error("ledger channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationError {
    #[error("unknown hackathon")]
    UnknownHackathon,
    #[error("missing project metadata")]
    MissingProjectMeta,
    #[error("vote store unavailable")]
    VoteStore,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementError {
    #[error("no result for project")]
    NoResult,
    #[error("result not approved")]
    NotApproved,
    #[error("project already settled")]
    AlreadySettled,
    #[error("unknown project")]
    UnknownProject,
    #[error("unknown hackathon")]
    UnknownHackathon,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
