//! Wire and file formats: hub XML and batch CSV.

pub mod csv;
pub mod xml;
