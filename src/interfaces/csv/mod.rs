pub mod receipt_writer;
pub mod vend_reader;
