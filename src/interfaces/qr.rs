//! Parsing of decoded merchant QR payloads.
//!
//! Image decoding happens on the device; this module only reads the text the
//! scanner produced. Three shapes are accepted: a `upi://pay?...` link, a bare
//! `pa=...&am=...` query string, and a bare VPA.

use crate::domain::payment::{Amount, PaymentRequest, Vpa};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::borrow::Cow;
use std::str::FromStr;
use url::Url;

const DEFAULT_DESCRIPTION: &str = "QR Payment";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub vpa: Vpa,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub merchant_name: Option<String>,
}

impl QrPayload {
    pub fn parse(payload: &str) -> Result<Self> {
        let payload = payload.trim();
        if payload
            .get(..6)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("upi://"))
        {
            let url = Url::parse(payload).map_err(|e| PaymentError::InvalidQr(e.to_string()))?;
            return Self::from_pairs(url.query_pairs());
        }
        if payload.contains("pa=") {
            let query = payload.split_once('?').map_or(payload, |(_, q)| q);
            return Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()));
        }
        if payload.contains('@') {
            return Ok(Self {
                vpa: Vpa::new(payload).map_err(|e| PaymentError::InvalidQr(e.to_string()))?,
                amount: None,
                description: None,
                merchant_name: None,
            });
        }
        Err(PaymentError::InvalidQr("unrecognized QR format".to_string()))
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Result<Self> {
        let mut vpa = None;
        let mut amount = None;
        let mut description = None;
        let mut merchant_name = None;

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "pa" => vpa = Some(value.to_string()),
                "am" => {
                    amount = Some(Decimal::from_str(value).map_err(|e| {
                        PaymentError::InvalidQr(format!("bad amount '{value}': {e}"))
                    })?)
                }
                "tn" => description = Some(value.to_string()),
                "pn" => merchant_name = Some(value.to_string()),
                _ => {}
            }
        }

        let vpa = vpa.ok_or_else(|| PaymentError::InvalidQr("missing payee address".to_string()))?;
        Ok(Self {
            vpa: Vpa::new(vpa).map_err(|e| PaymentError::InvalidQr(e.to_string()))?,
            amount,
            description,
            merchant_name,
        })
    }

    /// Seeds a payment from this QR. `amount` is what the user confirmed and
    /// takes precedence over the amount encoded in the QR.
    pub fn into_request(self, amount: Option<Decimal>) -> Result<PaymentRequest> {
        let amount = amount.or(self.amount).ok_or_else(|| {
            PaymentError::InvalidRequest("no amount given and none in QR".to_string())
        })?;
        let description = self
            .description
            .or(self.merchant_name)
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        Ok(PaymentRequest::new(
            self.vpa,
            Amount::new(amount)?,
            Some(description),
        ))
    }
}

impl FromStr for QrPayload {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
