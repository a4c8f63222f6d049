//! Order billing: checkout, the pending/paid/cancelled/refunded lifecycle,
//! inventory accounting, ticket issuance and gap-free document numbering.

mod audit;
mod error;
mod inventory;
mod sequence;
mod tickets;

pub(crate) mod store;

pub mod checkout;
pub mod lifecycle;

pub use checkout::{CartItem, CheckoutOutcome, CheckoutRequest, CheckoutUrls};
pub use error::BillingError;
pub use lifecycle::{CancelOutcome, CompletedOrder, CompletionOutcome, OrderLifecycle};
