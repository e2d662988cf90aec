use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Upi,
    Netbanking,
    Cash,
    Wallet,
}

/// Coupon figures frozen onto the payment at booking time. `amount` is the
/// currency value taken off, not the percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountInfo {
    pub code: Option<String>,
    #[serde(default)]
    pub percent: i32,
    #[serde(default)]
    pub amount: i64,
}

/// Ledger row. Stubs are inserted by the booking commit with
/// `status = pending`; this cell only settles and reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub payment_id: String,
    pub appointment_id: String,
    pub patient_id: Uuid,
    pub total_amount: i64,
    pub discount_info: Option<DiscountInfo>,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Insert shape for a fresh stub. The final `amount` is the total minus
    /// whatever the discount figures say was taken off.
    pub fn stub_row(
        payment_code: &str,
        appointment_code: &str,
        patient_id: Uuid,
        total_amount: i64,
        discount_info: Option<&DiscountInfo>,
    ) -> Value {
        let amount = total_amount - discount_info.map(|d| d.amount).unwrap_or(0);
        json!({
            "paymentId": payment_code,
            "appointmentId": appointment_code,
            "patientId": patient_id,
            "totalAmount": total_amount,
            "discountInfo": discount_info,
            "amount": amount,
            "status": PaymentStatus::Pending,
            "createdAt": Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    pub payment_method: PaymentMethod,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment not found")]
    NotFound,

    #[error("Payment is already {0}, only pending payments can be settled")]
    InvalidTransition(PaymentStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
