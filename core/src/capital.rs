//! The capital-allocation contract (spec §4.4). Lives in `engine-core`
//! rather than in a strategy/execution crate so both sides of the
//! reserve/release protocol can depend on the trait without depending on
//! each other: `engine-strategy` implements it, `engine-execution` calls it.

use rust_decimal::Decimal;

/// Narrow reserve/release contract a capital allocator exposes to the
/// order executor. `try_reserve` must be atomic with respect to concurrent
/// callers; a `false` return means the caller must not place the order.
pub trait CapitalReserve: Send + Sync {
    fn try_reserve(&self, strategy: &str, amount: Decimal) -> bool;
    fn release(&self, strategy: &str, amount: Decimal);
}
