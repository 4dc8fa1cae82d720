pub mod domain_event;
pub mod order_rail;
pub mod order_state;
pub mod order_type;
pub mod payment_state;
pub mod payment_type;
pub mod run_state;
