//! Row normalizers, one per `Layout`.
//!
//! Each normalizer is a pure function from one raw CSV row to a `RowOutcome`. A row that simply
//! has no amount is a `Skip`; a row the normalizer cannot make sense of at all is an `Error`. Only
//! errors are reported back to the caller of an import.

use crate::model::{strip_cell, Amount, Mapping, Transaction};
use std::fmt::{Display, Formatter};

/// The result of normalizing one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowOutcome {
    Row(Transaction),
    Skip(SkipReason),
    Error(String),
}

/// Why a row was dropped without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipReason {
    /// Every cell in the row is empty.
    Blank,
    /// A positional row without a third column.
    TooFewColumns(usize),
    /// None of the candidate amount columns holds a number.
    NoAmount,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Blank => write!(f, "blank row"),
            SkipReason::TooFewColumns(n) => write!(f, "only {n} columns"),
            SkipReason::NoAmount => write!(f, "no valid amount"),
        }
    }
}

/// Reads a named-column budget export.
///
/// The amount is `outflow - inflow`, where both cells keep only their digits, signs and decimal
/// point and anything unparsable counts as zero. A row whose outflow and inflow are both zero is
/// still a transaction. A difference too large for a `Decimal` is a row error.
pub(crate) fn budget<S: AsRef<str>>(mapping: &Mapping, row: &[S], currency: &str) -> RowOutcome {
    let date = match required(mapping, row, "Date") {
        Ok(v) => v,
        Err(e) => return RowOutcome::Error(e),
    };
    let payee = match required(mapping, row, "Payee") {
        Ok(v) => v,
        Err(e) => return RowOutcome::Error(e),
    };

    let outflow = Amount::parse_digits(optional(mapping, row, "Outflow"));
    let inflow = Amount::parse_digits(optional(mapping, row, "Inflow"));
    let amount = match outflow.value().checked_sub(inflow.value()) {
        Some(amount) => amount,
        None => {
            return RowOutcome::Error(format!(
                "amount overflow: {} - {}",
                outflow.value(),
                inflow.value()
            ))
        }
    };

    RowOutcome::Row(
        Transaction::new(date, payee, amount, currency)
            .with_category(optional(mapping, row, "Category"))
            .with_account(optional(mapping, row, "Account"))
            .with_memo(optional(mapping, row, "Memo")),
    )
}

/// Reads a bank export with named `debit` and `credit` columns. A debit becomes a negative amount
/// and a credit a positive one; debit is tried first.
pub(crate) fn debit_credit<S: AsRef<str>>(
    mapping: &Mapping,
    row: &[S],
    currency: &str,
) -> RowOutcome {
    let date = match required(mapping, row, "date") {
        Ok(v) => v,
        Err(e) => return RowOutcome::Error(e),
    };
    let description = match required(mapping, row, "description") {
        Ok(v) => v,
        Err(e) => return RowOutcome::Error(e),
    };

    let debit = mapping.get(row, "debit").and_then(Amount::parse_cell);
    let credit = mapping.get(row, "credit").and_then(Amount::parse_cell);
    match (debit, credit) {
        (Some(debit), _) => RowOutcome::Row(Transaction::new(
            date,
            description,
            -debit.value(),
            currency,
        )),
        (None, Some(credit)) => RowOutcome::Row(Transaction::new(
            date,
            description,
            credit.value(),
            currency,
        )),
        (None, None) => RowOutcome::Skip(SkipReason::NoAmount),
    }
}

/// Reads a headerless row: date, description, debit, credit.
///
/// Column 2 is a debit and is negated; when it is blank or not a number, column 3 is a credit and
/// is kept positive. Rows with fewer than three columns are skipped.
pub(crate) fn positional<S: AsRef<str>>(row: &[S], currency: &str) -> RowOutcome {
    if row.len() < 3 {
        return RowOutcome::Skip(SkipReason::TooFewColumns(row.len()));
    }
    let date = strip_cell(row[0].as_ref());
    let description = strip_cell(row[1].as_ref());

    let debit = row.get(2).and_then(|c| Amount::parse_cell(c.as_ref()));
    let credit = row.get(3).and_then(|c| Amount::parse_cell(c.as_ref()));
    let amount = match (debit, credit) {
        (Some(debit), _) => -debit.value(),
        (None, Some(credit)) => credit.value(),
        (None, None) => return RowOutcome::Skip(SkipReason::NoAmount),
    };
    RowOutcome::Row(Transaction::new(date, description, amount, currency))
}

/// Returns true when every cell of `row` is empty after trimming.
pub(crate) fn is_blank<S: AsRef<str>>(row: &[S]) -> bool {
    row.iter().all(|c| strip_cell(c.as_ref()).is_empty())
}

/// Looks up a column that must exist in the header. A short row yields an empty value.
fn required<'a, S: AsRef<str>>(
    mapping: &Mapping,
    row: &'a [S],
    name: &str,
) -> Result<&'a str, String> {
    if !mapping.contains(name) {
        return Err(format!("missing column '{name}'"));
    }
    Ok(strip_cell(mapping.get(row, name).unwrap_or_default()))
}

fn optional<'a, S: AsRef<str>>(mapping: &Mapping, row: &'a [S], name: &str) -> &'a str {
    strip_cell(mapping.get(row, name).unwrap_or_default())
}
