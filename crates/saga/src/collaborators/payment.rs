//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::{CustomerId, Money};

use crate::error::SagaError;

/// Result of a successful authorization.
#[derive(Debug, Clone)]
pub struct PaymentAuthorization {
    /// The payment ID assigned by the gateway.
    pub payment_id: String,
}

/// Trait for payment gateway operations.
///
/// Authorize places a hold, capture settles it. Void releases an
/// uncaptured hold; refund returns money after capture.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Places a hold on the customer's payment method.
    async fn authorize(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        amount: Money,
    ) -> Result<PaymentAuthorization, SagaError>;

    /// Settles a previously authorized payment.
    async fn capture(&self, payment_id: &str) -> Result<(), SagaError>;

    /// Releases an authorization without capturing it.
    async fn void(&self, payment_id: &str) -> Result<(), SagaError>;

    /// Returns money to the customer.
    async fn refund(&self, payment_id: &str, amount: Money) -> Result<(), SagaError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaymentState {
    Authorized,
    Captured,
    Voided,
    Refunded,
}

#[derive(Debug, Clone)]
struct PaymentRecord {
    #[allow(dead_code)]
    order_id: AggregateId,
    #[allow(dead_code)]
    customer_id: CustomerId,
    amount: Money,
    state: PaymentState,
    refunded: Option<Money>,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    payments: HashMap<String, PaymentRecord>,
    next_id: u32,
    fail_on_authorize: bool,
    fail_on_capture: bool,
    fail_on_refund: bool,
    authorize_failures_remaining: u32,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every authorize call.
    pub fn set_fail_on_authorize(&self, fail: bool) {
        self.state.write().unwrap().fail_on_authorize = fail;
    }

    /// Configures the gateway to fail the next `count` authorize calls, then
    /// succeed again.
    pub fn fail_next_authorizations(&self, count: u32) {
        self.state.write().unwrap().authorize_failures_remaining = count;
    }

    /// Configures the gateway to fail every capture call.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Configures the gateway to fail every refund call.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Returns the number of payments the gateway has seen.
    pub fn payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    /// Returns true if a payment exists with the given ID.
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.state.read().unwrap().payments.contains_key(payment_id)
    }

    /// Returns true if the payment has been captured.
    pub fn is_captured(&self, payment_id: &str) -> bool {
        self.payment_state(payment_id) == Some(PaymentState::Captured)
    }

    /// Returns true if the authorization has been voided.
    pub fn is_voided(&self, payment_id: &str) -> bool {
        self.payment_state(payment_id) == Some(PaymentState::Voided)
    }

    /// Returns true if the payment has been refunded.
    pub fn is_refunded(&self, payment_id: &str) -> bool {
        self.payment_state(payment_id) == Some(PaymentState::Refunded)
    }

    /// Returns the refunded amount for a payment, if any.
    pub fn refunded_amount(&self, payment_id: &str) -> Option<Money> {
        self.state
            .read()
            .unwrap()
            .payments
            .get(payment_id)
            .and_then(|record| record.refunded)
    }

    fn payment_state(&self, payment_id: &str) -> Option<PaymentState> {
        self.state
            .read()
            .unwrap()
            .payments
            .get(payment_id)
            .map(|record| record.state)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        amount: Money,
    ) -> Result<PaymentAuthorization, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.authorize_failures_remaining > 0 {
            state.authorize_failures_remaining -= 1;
            return Err(SagaError::PaymentGateway(
                "Gateway temporarily unavailable".to_string(),
            ));
        }
        if state.fail_on_authorize {
            return Err(SagaError::PaymentGateway("Payment declined".to_string()));
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state.payments.insert(
            payment_id.clone(),
            PaymentRecord {
                order_id,
                customer_id,
                amount,
                state: PaymentState::Authorized,
                refunded: None,
            },
        );

        Ok(PaymentAuthorization { payment_id })
    }

    async fn capture(&self, payment_id: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_capture {
            return Err(SagaError::PaymentGateway("Capture rejected".to_string()));
        }

        let record = state.payments.get_mut(payment_id).ok_or_else(|| {
            SagaError::PaymentGateway(format!("Unknown payment: {payment_id}"))
        })?;
        if record.state != PaymentState::Authorized {
            return Err(SagaError::PaymentGateway(format!(
                "Payment {payment_id} is not authorized"
            )));
        }

        record.state = PaymentState::Captured;
        Ok(())
    }

    async fn void(&self, payment_id: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if let Some(record) = state.payments.get_mut(payment_id) {
            record.state = PaymentState::Voided;
        }
        Ok(())
    }

    async fn refund(&self, payment_id: &str, amount: Money) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(SagaError::PaymentGateway("Refund rejected".to_string()));
        }

        if let Some(record) = state.payments.get_mut(payment_id) {
            record.state = PaymentState::Refunded;
            record.refunded = Some(amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authorize_capture_refund() {
        let gateway = InMemoryPaymentGateway::new();
        let order_id = AggregateId::new();
        let customer_id = CustomerId::new();
        let amount = Money::from_cents(5000);

        let auth = gateway
            .authorize(order_id, customer_id, amount)
            .await
            .unwrap();
        assert!(auth.payment_id.starts_with("PAY-"));
        assert_eq!(gateway.payment_count(), 1);

        gateway.capture(&auth.payment_id).await.unwrap();
        assert!(gateway.is_captured(&auth.payment_id));

        gateway
            .refund(&auth.payment_id, Money::from_cents(4750))
            .await
            .unwrap();
        assert!(gateway.is_refunded(&auth.payment_id));
        assert_eq!(
            gateway.refunded_amount(&auth.payment_id),
            Some(Money::from_cents(4750))
        );
    }

    #[tokio::test]
    async fn test_void_releases_authorization() {
        let gateway = InMemoryPaymentGateway::new();
        let auth = gateway
            .authorize(AggregateId::new(), CustomerId::new(), Money::from_cents(1000))
            .await
            .unwrap();

        gateway.void(&auth.payment_id).await.unwrap();
        assert!(gateway.is_voided(&auth.payment_id));

        // A voided hold can no longer be captured
        let result = gateway.capture(&auth.payment_id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fail_on_authorize() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_authorize(true);

        let result = gateway
            .authorize(AggregateId::new(), CustomerId::new(), Money::from_cents(1000))
            .await;
        assert!(result.is_err());
        assert_eq!(gateway.payment_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_clear() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.fail_next_authorizations(2);

        let order_id = AggregateId::new();
        let customer_id = CustomerId::new();
        let amount = Money::from_cents(1000);

        assert!(gateway.authorize(order_id, customer_id, amount).await.is_err());
        assert!(gateway.authorize(order_id, customer_id, amount).await.is_err());
        assert!(gateway.authorize(order_id, customer_id, amount).await.is_ok());
    }

    #[tokio::test]
    async fn test_sequential_payment_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let order_id = AggregateId::new();
        let customer_id = CustomerId::new();
        let amount = Money::from_cents(1000);

        let a1 = gateway.authorize(order_id, customer_id, amount).await.unwrap();
        let a2 = gateway.authorize(order_id, customer_id, amount).await.unwrap();

        assert_eq!(a1.payment_id, "PAY-0001");
        assert_eq!(a2.payment_id, "PAY-0002");
    }
}
