//! Test data factories for creating valid test fixtures.
//!
//! Each factory creates a complete, valid object with sensible defaults; use
//! the closure parameter to override specific fields as needed.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    application::use_cases::{order::OrderProfile, payment::PaymentProfile},
    domain::entities::{
        order_rail::OrderRail, order_state::OrderState, order_type::OrderType,
        payment_state::PaymentState, payment_type::PaymentType,
    },
};

pub fn test_datetime() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// Create a test order with sensible defaults.
pub fn create_test_order(overrides: impl FnOnce(&mut OrderProfile)) -> OrderProfile {
    let mut order = OrderProfile {
        id: Uuid::new_v4(),
        rail: OrderRail::Wechat,
        user_id: Uuid::new_v4(),
        trade_number: Uuid::new_v4().simple().to_string(),
        fee_in_cents: 1_000,
        property_id: "property-1".to_string(),
        order_type: OrderType::PaySupport,
        state: OrderState::NotPay,
        transaction_id: None,
        error_message: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut order);
    order
}

/// Create a test payment with sensible defaults: an open, matured wechat
/// income entry for a random payee.
pub fn create_test_payment(overrides: impl FnOnce(&mut PaymentProfile)) -> PaymentProfile {
    let mut payment = PaymentProfile {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        payee_id: Some(Uuid::new_v4()),
        trade_number: Uuid::new_v4().simple().to_string(),
        amount_in_cents: 1_000,
        amount_in_shells: 0,
        withdraw_percent: 88,
        sku_id: None,
        order_id: None,
        installment: 0,
        payment_type: PaymentType::WechatPay,
        state: PaymentState::Open,
        valid_after: Some(test_datetime()),
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut payment);
    payment
}
