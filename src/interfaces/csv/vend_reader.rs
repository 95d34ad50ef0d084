use crate::domain::transaction::{Amount, MeterNumber};
use crate::error::{Result, VendError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct RawRow {
    meter: String,
    amount: String,
}

fn at_line(line: usize, error: VendError) -> VendError {
    match error {
        VendError::Validation(msg) => VendError::Validation(format!("line {line}: {msg}")),
        other => other,
    }
}

/// One validated line of a batch vend file.
#[derive(Debug, Clone, PartialEq)]
pub struct VendRow {
    /// 1-based data line number, for error reporting.
    pub line: usize,
    pub meter: MeterNumber,
    pub amount: Amount,
}

/// Reads `meter,amount` rows from a CSV source.
///
/// Fields are trimmed and extra columns are tolerated. Each row is validated
/// on its own so one bad line does not stop the batch.
pub struct VendReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> VendReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<VendRow>> {
        self.reader
            .into_deserialize::<RawRow>()
            .enumerate()
            .map(|(index, row)| {
                let line = index + 1;
                let row = row.map_err(VendError::from)?;
                let meter = MeterNumber::parse(&row.meter).map_err(|e| at_line(line, e))?;
                let amount = Decimal::from_str(&row.amount)
                    .map_err(|_| VendError::Validation(format!("invalid amount {:?}", row.amount)))
                    .and_then(Amount::new)
                    .map_err(|e| at_line(line, e))?;
                Ok(VendRow { line, meter, amount })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "meter, amount\n01234567890, 50.00\n 0987 , 12.5";
        let rows: Vec<Result<VendRow>> = VendReader::new(data.as_bytes()).rows().collect();

        assert_eq!(rows.len(), 2);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.line, 1);
        assert_eq!(first.meter.as_str(), "01234567890");
        assert_eq!(first.amount.to_wire(), "50.00");
        assert_eq!(rows[1].as_ref().unwrap().amount.value(), dec!(12.5));
    }

    #[test]
    fn test_reader_reports_bad_rows_and_continues() {
        let data = "meter,amount\n0101,-5\n,10\n0202,abc\n0303,1\n0404";
        let rows: Vec<Result<VendRow>> = VendReader::new(data.as_bytes()).rows().collect();

        assert_eq!(rows.len(), 5);
        assert!(matches!(&rows[0], Err(VendError::Validation(msg)) if msg.starts_with("line 1")));
        assert!(matches!(&rows[1], Err(VendError::Validation(_))));
        assert!(matches!(&rows[2], Err(VendError::Validation(msg)) if msg.contains("invalid amount")));
        assert_eq!(rows[3].as_ref().unwrap().meter.as_str(), "0303");
        assert!(matches!(&rows[4], Err(VendError::Csv(_))));
    }
}
