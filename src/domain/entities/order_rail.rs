use serde::{Deserialize, Serialize};

/// Which payment gateway an order went through. The three rails share one
/// table and one state machine; gateway-specific request plumbing lives with
/// the gateway adapters, not in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_rail", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderRail {
    Wechat,
    Alipay,
    Ios,
}

impl OrderRail {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderRail::Wechat => "wechat",
            OrderRail::Alipay => "alipay",
            OrderRail::Ios => "ios",
        }
    }
}

impl std::fmt::Display for OrderRail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
