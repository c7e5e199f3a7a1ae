pub mod history_writer;
pub mod sms_reader;
