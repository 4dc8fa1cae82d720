use serde::{Deserialize, Serialize};

/// Gateway order lifecycle.
///
/// Transitions are driven exclusively by parsed gateway callbacks and poll
/// responses, which arrive duplicated and out of order. `accepts` encodes the
/// machine: a transition into a terminal state is a no-op when the order is
/// already in that or a later terminal state, so re-delivered callbacks are
/// harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    NotPay,
    UserPaying,
    Success,
    Closed,
    Refunding,
    Refunded,
    PayError,
    Revoked,
    Unknown,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::NotPay => "not_pay",
            OrderState::UserPaying => "user_paying",
            OrderState::Success => "success",
            OrderState::Closed => "closed",
            OrderState::Refunding => "refunding",
            OrderState::Refunded => "refunded",
            OrderState::PayError => "pay_error",
            OrderState::Revoked => "revoked",
            OrderState::Unknown => "unknown",
        }
    }

    /// States from which no further gateway-driven movement is expected.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderState::Closed | OrderState::Refunded | OrderState::Revoked
        )
    }

    /// Position on the success → refund track; later states absorb earlier
    /// re-deliveries.
    fn settled_rank(&self) -> Option<u8> {
        match self {
            OrderState::Success => Some(1),
            OrderState::Refunding => Some(2),
            OrderState::Refunded => Some(3),
            _ => None,
        }
    }

    /// Whether a transition from `self` into `next` should be applied.
    /// Returns false both for illegal transitions and for duplicates that
    /// must be absorbed silently.
    pub fn accepts(&self, next: OrderState) -> bool {
        if *self == next {
            return false;
        }

        // Revocation can interrupt anything still in flight; an unparseable
        // gateway response can be recorded from any live state.
        if matches!(next, OrderState::Revoked | OrderState::Unknown) {
            return !self.is_final();
        }

        match (self, next) {
            (OrderState::NotPay, OrderState::UserPaying)
            | (OrderState::NotPay, OrderState::Success)
            | (OrderState::NotPay, OrderState::PayError)
            | (OrderState::NotPay, OrderState::Closed)
            | (OrderState::UserPaying, OrderState::Success)
            | (OrderState::UserPaying, OrderState::PayError)
            | (OrderState::UserPaying, OrderState::Closed)
            | (OrderState::Success, OrderState::Refunding)
            | (OrderState::Refunding, OrderState::Refunded)
            // A failed refund leaves the money where it was.
            | (OrderState::Refunding, OrderState::PayError) => true,
            (from, to) => match (from.settled_rank(), to.settled_rank()) {
                // Late or duplicate delivery on the refund track.
                (Some(have), Some(got)) => got > have,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
