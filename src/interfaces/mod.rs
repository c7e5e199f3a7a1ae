//! Edges of the pipeline: recorded SMS feeds, history export and QR payloads.

pub mod csv;
pub mod qr;
