use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Error;
use crate::hash::{SketchKey, DEFAULT_SEED};

/// One transaction: the product being accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub product_code: u64,
}

/// A transactions CSV loaded into memory.
///
/// The header line must name a `product_code` column.  When a `usecase`
/// column is also present the product codes are opaque strings and are
/// hashed to `u64`; otherwise they are parsed as numbers.
pub struct TransactionTrace {
    records: Vec<Transaction>,
}

impl TransactionTrace {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(Error::MissingColumn("product_code")),
        };
        let columns: Vec<&str> = header.trim_end().split(',').collect();
        let product_col = columns
            .iter()
            .position(|column| *column == "product_code")
            .ok_or(Error::MissingColumn("product_code"))?;
        let hashed_keys = columns.iter().any(|column| *column == "usecase");

        let mut records = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let field = line
                .split(',')
                .nth(product_col)
                .ok_or_else(|| Error::BadRecord {
                    line: line_no + 2,
                    reason: format!("fewer than {} columns", product_col + 1),
                })?;
            let product_code = if hashed_keys {
                field.trim().hash64(DEFAULT_SEED)
            } else {
                field.trim().parse::<u64>().map_err(|e| Error::BadRecord {
                    line: line_no + 2,
                    reason: e.to_string(),
                })?
            };
            records.push(Transaction { product_code });
        }
        Ok(TransactionTrace { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Transaction> {
        self.records.get(index).copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Transaction> + '_ {
        self.records.iter().copied()
    }
}
