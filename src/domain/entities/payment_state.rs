use serde::{Deserialize, Serialize};

/// Lifecycle state of a ledger entry.
///
/// `Drafted` rows await fulfillment confirmation, `Open` rows await maturity,
/// `Pending` rows are held while a refund is being resolved. `Closed` is
/// written exactly once; for settleable entries only the settlement engine
/// writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Drafted,
    Open,
    Pending,
    Closed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Drafted => "drafted",
            PaymentState::Open => "open",
            PaymentState::Pending => "pending",
            PaymentState::Closed => "closed",
        }
    }

    /// Whether the settlement engine may pick this entry up once matured.
    pub fn is_settleable(&self) -> bool {
        matches!(self, PaymentState::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Closed)
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
