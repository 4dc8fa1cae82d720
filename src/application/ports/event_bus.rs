use crate::domain::entities::domain_event::DomainEvent;

/// Fire-and-forget publication of domain events.
///
/// Implementations must never block the caller and never report failure back
/// into ledger code paths; an event that cannot be queued is dropped with a
/// warning. This is a deliberate at-most-once channel, distinct from the
/// at-least-once guarantees of the ledger itself.
pub trait EventBusPort: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Bus that swallows everything; used where notification is irrelevant.
pub struct NullEventBus;

impl EventBusPort for NullEventBus {
    fn publish(&self, _event: DomainEvent) {}
}
