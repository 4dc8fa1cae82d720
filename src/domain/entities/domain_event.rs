use serde::Serialize;
use uuid::Uuid;

/// Domain events handed to the notifier. Delivery is best-effort and
/// at-most-once; nothing in the ledger depends on these arriving.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    NewPayment {
        payment_id: Uuid,
        user_id: Uuid,
        payee_id: Option<Uuid>,
        amount_in_cents: i64,
    },
    NewBalance {
        user_id: Uuid,
        amount_in_cents: i64,
    },
    NewMember {
        user_id: Uuid,
        payee_id: Uuid,
        sku_id: String,
    },
    WithdrawBacklog {
        open_count: i64,
    },
}

impl DomainEvent {
    /// Topic the event is published under on the bus.
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::NewPayment { .. } => "payment",
            DomainEvent::NewBalance { .. } => "balance",
            DomainEvent::NewMember { .. } => "member",
            DomainEvent::WithdrawBacklog { .. } => "operator",
        }
    }
}
