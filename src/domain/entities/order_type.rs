use serde::{Deserialize, Serialize};

/// What an order purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    PayShell,
    PayMembership,
    PaySupport,
    PayFeed,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::PayShell => "pay_shell",
            OrderType::PayMembership => "pay_membership",
            OrderType::PaySupport => "pay_support",
            OrderType::PayFeed => "pay_feed",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
