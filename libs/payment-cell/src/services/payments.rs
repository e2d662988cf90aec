use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{return_representation, PostgrestClient};

use crate::models::{MarkPaidRequest, Payment, PaymentError, PaymentStatus};

pub struct PaymentService {
    db: Arc<PostgrestClient>,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub async fn get_payment(&self, id: Uuid) -> Result<Payment, PaymentError> {
        let rows: Vec<Value> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/payments?id=eq.{}", id),
                None,
                None,
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        rows.first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?
            .ok_or(PaymentError::NotFound)
    }

    pub async fn list_payments(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>, PaymentError> {
        let mut path = "/rest/v1/payments?order=createdAt.desc".to_string();
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let payments: Vec<Payment> = self
            .db
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        debug!("Listed {} payments", payments.len());
        Ok(payments)
    }

    /// Settles a pending stub. Terminal states stay put; re-settling or
    /// touching a failed/refunded payment is rejected.
    pub async fn mark_paid(
        &self,
        id: Uuid,
        request: MarkPaidRequest,
    ) -> Result<Payment, PaymentError> {
        let payment = self.get_payment(id).await?;

        if payment.status != PaymentStatus::Pending {
            return Err(PaymentError::InvalidTransition(payment.status));
        }

        let update = json!({
            "status": PaymentStatus::Paid,
            "paymentMethod": request.payment_method,
            "paymentTime": Utc::now().to_rfc3339(),
            "remark": request.remark,
        });

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/payments?id=eq.{}", id),
                None,
                Some(update),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let settled: Payment = result
            .first()
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?
            .ok_or(PaymentError::NotFound)?;

        info!("Payment {} marked paid", settled.payment_id);
        Ok(settled)
    }
}
