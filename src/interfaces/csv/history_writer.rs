use crate::domain::payment::{PaymentRequest, PaymentStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct HistoryRow<'a> {
    id: &'a str,
    vpa: &'a str,
    amount: Decimal,
    status: PaymentStatus,
    transaction_ref: Option<&'a str>,
    created_at: String,
    description: Option<&'a str>,
}

/// Writes payment history as CSV, one row per payment.
pub struct HistoryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> HistoryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_payments(&mut self, payments: &[PaymentRequest]) -> Result<()> {
        for payment in payments {
            self.writer.serialize(HistoryRow {
                id: &payment.id,
                vpa: payment.vpa.as_str(),
                amount: payment.amount.value(),
                status: payment.status,
                transaction_ref: payment.transaction_ref.as_deref(),
                created_at: payment.created_at.to_rfc3339(),
                description: payment.description.as_deref(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_payments() {
        let mut completed =
            PaymentRequest::from_input("merchant@upi", dec!(149.50), Some("Coffee".to_string()))
                .unwrap();
        completed.status = PaymentStatus::Completed;
        completed.transaction_ref = Some("1234567890AB".to_string());
        let pending = PaymentRequest::from_input("shop@okaxis", dec!(20), None).unwrap();

        let mut buf = Vec::new();
        HistoryWriter::new(&mut buf)
            .write_payments(&[completed.clone(), pending.clone()])
            .unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines[0],
            "id,vpa,amount,status,transaction_ref,created_at,description"
        );
        assert!(lines[1].starts_with(&format!(
            "{},merchant@upi,149.5,completed,1234567890AB,",
            completed.id
        )));
        assert!(lines[1].ends_with(",Coffee"));
        assert!(lines[2].starts_with(&format!("{},shop@okaxis,20,pending,,", pending.id)));
    }
}
