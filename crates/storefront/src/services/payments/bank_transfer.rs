//! Bank transfer. The shopper is shown our account details; staff confirm
//! receipt by hand.

use serde_json::{Value, json};

use desguace_core::payment::{PaymentOrder, PaymentProvider, PaymentResult};

use super::{CallbackData, CallbackOutcome, PaymentError, PaymentModule, flag, setting};

/// Transaction reference for a transfer: `BANK_{order_number}_{unix_ts}`.
#[must_use]
pub fn transaction_id(order_number: &str, unix_ts: i64) -> String {
    format!("BANK_{order_number}_{unix_ts}")
}

pub struct BankTransferModule {
    bank_name: Option<String>,
    account_number: Option<String>,
    account_holder: Option<String>,
    instructions: Option<String>,
    auto_approve: bool,
}

impl BankTransferModule {
    #[must_use]
    pub fn from_config(config: &Value) -> Self {
        Self {
            bank_name: setting(config, &["bank_name", "bankName"]),
            account_number: setting(config, &["account_number", "accountNumber"]),
            account_holder: setting(config, &["account_holder", "accountHolder"]),
            instructions: setting(config, &["instructions"]),
            auto_approve: flag(config, &["auto_approve", "autoApprove"]),
        }
    }

    fn result(&self, order: &PaymentOrder, unix_ts: i64) -> PaymentResult {
        let status = if self.auto_approve { "completed" } else { "pending" };
        PaymentResult {
            success: true,
            transaction_id: Some(transaction_id(&order.order_number, unix_ts)),
            redirect_url: None,
            error_message: None,
            data: Some(json!({
                "bankName": self.bank_name,
                "accountNumber": self.account_number,
                "accountHolder": self.account_holder,
                "instructions": self.instructions,
                "reference": order.order_number,
                "amount": order.amount,
                "status": status,
            })),
        }
    }
}

impl PaymentModule for BankTransferModule {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::BankTransfer
    }

    async fn process_payment(&self, order: &PaymentOrder) -> Result<PaymentResult, PaymentError> {
        Ok(self.result(order, chrono::Utc::now().timestamp()))
    }

    async fn handle_callback(&self, _data: &CallbackData) -> Result<CallbackOutcome, PaymentError> {
        Err(PaymentError::Unsupported(PaymentProvider::BankTransfer))
    }

    async fn verify_transaction(&self, _transaction_id: &str) -> Result<bool, PaymentError> {
        Ok(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use desguace_core::{OrderId, Price};

    use super::*;

    fn order() -> PaymentOrder {
        PaymentOrder {
            order_id: OrderId::new(7),
            order_number: "PED-000007".into(),
            amount: Price::from_cents(5_000),
            currency: "EUR".into(),
            description: String::new(),
            customer_email: "a@b.es".into(),
            customer_name: "A".into(),
            return_url: String::new(),
            cancel_url: String::new(),
        }
    }

    #[test]
    fn test_transaction_id_format() {
        assert_eq!(transaction_id("PED-000007", 1_700_000_000), "BANK_PED-000007_1700000000");
    }

    #[test]
    fn test_status_follows_auto_approve() {
        let manual = BankTransferModule::from_config(&json!({
            "bank_name": "Caja Rural", "account_number": "ES00 1234"
        }));
        let result = manual.result(&order(), 1);
        let data = result.data.unwrap();
        assert_eq!(data["status"], "pending");
        assert_eq!(data["bankName"], "Caja Rural");

        let auto = BankTransferModule::from_config(&json!({"autoApprove": true}));
        assert_eq!(auto.result(&order(), 1).data.unwrap()["status"], "completed");
    }
}
