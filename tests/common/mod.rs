use std::io::Error;
use tempfile::NamedTempFile;

pub const SUCCESS_SMS: &str =
    "Rs.500 debited from A/c XX1234. UPI Txn successful. UPI Ref No 1234567890AB";
pub const FAILURE_SMS: &str = "Your UPI transaction of INR 250 failed. UTR 9988776655";

/// Writes a `delay_ms,sender,body` SMS feed to a temporary CSV file.
pub fn sms_feed(rows: &[(u64, &str, &str)]) -> Result<NamedTempFile, Error> {
    let file = NamedTempFile::new()?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file.reopen()?);

    wtr.write_record(["delay_ms", "sender", "body"])?;
    for &(delay_ms, sender, body) in rows {
        wtr.write_record([delay_ms.to_string().as_str(), sender, body])?;
    }

    wtr.flush()?;
    Ok(file)
}
