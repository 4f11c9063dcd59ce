use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::models::expense::Expense;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    date: String,
    name: &'a str,
    amount: String,
    category: &'a str,
}

/// Write expenses as CSV with a `date,name,amount,category` header.
pub fn write_expenses_csv<W: Write>(writer: W, expenses: &[Expense]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    for expense in expenses {
        wtr.serialize(ExportRow {
            date: expense.date.format("%Y-%m-%d").to_string(),
            name: &expense.name,
            amount: format!("{:.2}", expense.amount),
            category: expense.category.as_ref().map(|c| c.name.as_str()).unwrap_or(""),
        })?;
    }
    wtr.flush()?;
    Ok(expenses.len())
}
