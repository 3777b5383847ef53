//! outcome of [TransactionBuilder::build()](super::transaction_builder::TransactionBuilder::build).

use crate::models::blockchain::transaction::Transaction;
use crate::tx_initiation::error::BuildError;

/// either a fully signed transaction or the reason building failed.
///
/// `build()` never returns early with an error: callers always get a result
/// value back, so they can release anything they locked for the build before
/// inspecting it.
#[derive(Debug, Clone, PartialEq, Eq, strum::EnumIs)]
pub enum TransactionBuilderResult {
    Tx(Transaction),
    Error(BuildError),
}

// `is_tx()` and `is_error()` come from `strum::EnumIs`.
impl TransactionBuilderResult {
    pub fn tx(&self) -> Option<&Transaction> {
        match self {
            Self::Tx(tx) => Some(tx),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        match self {
            Self::Tx(_) => None,
            Self::Error(e) => Some(e),
        }
    }

    /// error message as shown to wallet users, or empty for a transaction.
    pub fn error_message(&self) -> String {
        self.error().map(|e| e.to_string()).unwrap_or_default()
    }

    /// take the transaction, or the build error.
    pub fn into_result(self) -> Result<Transaction, BuildError> {
        self.into()
    }
}

impl From<Result<Transaction, BuildError>> for TransactionBuilderResult {
    fn from(result: Result<Transaction, BuildError>) -> Self {
        match result {
            Ok(tx) => Self::Tx(tx),
            Err(e) => Self::Error(e),
        }
    }
}

impl From<TransactionBuilderResult> for Result<Transaction, BuildError> {
    fn from(result: TransactionBuilderResult) -> Self {
        match result {
            TransactionBuilderResult::Tx(tx) => Ok(tx),
            TransactionBuilderResult::Error(e) => Err(e),
        }
    }
}
