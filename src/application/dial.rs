use crate::domain::payment::{Amount, PaymentRequest, Vpa};
use crate::error::Result;
use rust_decimal::Decimal;

/// Builds the USSD dial string for a direct UPI transfer:
/// `*99*1*3*<vpa>*<amount>*1#`.
///
/// The same short code is shared by every bank. The amount is rendered
/// without trailing zeros (`149.50` dials as `149.5`).
pub fn encode(vpa: &str, amount: Decimal) -> Result<String> {
    Ok(encode_parts(&Vpa::new(vpa)?, Amount::new(amount)?))
}

/// Dial string for an already validated request.
pub fn encode_request(request: &PaymentRequest) -> String {
    encode_parts(&request.vpa, request.amount)
}

fn encode_parts(vpa: &Vpa, amount: Amount) -> String {
    format!("*99*1*3*{vpa}*{amount}*1#")
}
