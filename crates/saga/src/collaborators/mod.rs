//! External collaborator traits and in-memory implementations for saga steps.

pub mod notification;
pub mod payment;
pub mod shipping;

pub use notification::{InMemoryNotificationService, NotificationService};
pub use payment::{InMemoryPaymentGateway, PaymentAuthorization, PaymentGateway};
pub use shipping::{InMemoryShippingProvider, Shipment, ShippingProvider};
