/// How a transaction body asks its transaction to end.
///
/// Returning an error from the body always rolls back, whatever outcome it would have chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionOutcome {
    #[default]
    Commit,
    Rollback,
}

impl TransactionOutcome {
    #[must_use]
    pub fn is_commit(self) -> bool {
        matches!(self, Self::Commit)
    }
}
