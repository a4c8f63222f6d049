pub mod catalog;
pub mod order;
pub mod ticket;

pub use catalog::{Edition, Organization};
pub use order::{Order, OrderItem, OrderStatus};
pub use ticket::{Ticket, TicketStatus, TicketType};
