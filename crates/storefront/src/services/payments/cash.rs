//! Pay on pickup at the yard. No shipping is charged.

use serde_json::{Value, json};

use desguace_core::payment::{PaymentOrder, PaymentProvider, PaymentResult};

use super::{CallbackData, CallbackOutcome, PaymentError, PaymentModule, setting};

pub struct CashModule {
    pickup_location: Option<String>,
    pickup_hours: Option<String>,
    contact_phone: Option<String>,
    instructions: Option<String>,
}

impl CashModule {
    #[must_use]
    pub fn from_config(config: &Value) -> Self {
        Self {
            pickup_location: setting(config, &["pickup_location", "pickupLocation"]),
            pickup_hours: setting(config, &["pickup_hours", "pickupHours"]),
            contact_phone: setting(config, &["contact_phone", "contactPhone"]),
            instructions: setting(config, &["instructions"]),
        }
    }
}

impl PaymentModule for CashModule {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Cash
    }

    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentResult, PaymentError> {
        Ok(PaymentResult {
            success: true,
            transaction_id: Some(format!(
                "CASH_{}_{}",
                order.order_number,
                chrono::Utc::now().timestamp()
            )),
            redirect_url: None,
            error_message: None,
            data: Some(json!({
                "pickupLocation": self.pickup_location,
                "pickupHours": self.pickup_hours,
                "contactPhone": self.contact_phone,
                "instructions": self.instructions,
                "amount": order.amount,
                "status": "pending",
            })),
        })
    }

    async fn handle_callback(&self, _data: &CallbackData) -> Result<CallbackOutcome, PaymentError> {
        Err(PaymentError::Unsupported(PaymentProvider::Cash))
    }

    async fn verify_transaction(&self, _transaction_id: &str) -> Result<bool, PaymentError> {
        Ok(false)
    }
}
