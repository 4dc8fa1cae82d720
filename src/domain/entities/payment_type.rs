use serde::{Deserialize, Serialize};

/// What kind of money movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Cash paid through the wechat rail (memberships, feed unlocks).
    WechatPay,
    /// Membership paid from the buyer's shell balance.
    ShellPay,
    /// Shell top-up purchase; no payee, never settles.
    ShellBuy,
    /// Membership paid through an iOS in-app purchase.
    IosBuy,
    /// Creator payout request; closed by the manual payout process.
    Withdraw,
    /// One-off sponsorship.
    Support,
    /// Per-feed unlock charge.
    FeedCharge,
}

impl PaymentType {
    /// Types the settlement engine matures into creator balance. Withdraw
    /// rows are payouts, not income; shell top-ups have no payee.
    pub const SETTLEABLE: [PaymentType; 5] = [
        PaymentType::WechatPay,
        PaymentType::ShellPay,
        PaymentType::IosBuy,
        PaymentType::Support,
        PaymentType::FeedCharge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::WechatPay => "wechat_pay",
            PaymentType::ShellPay => "shell_pay",
            PaymentType::ShellBuy => "shell_buy",
            PaymentType::IosBuy => "ios_buy",
            PaymentType::Withdraw => "withdraw",
            PaymentType::Support => "support",
            PaymentType::FeedCharge => "feed_charge",
        }
    }

    pub fn is_settleable(&self) -> bool {
        Self::SETTLEABLE.contains(self)
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
