use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::expense::Expense;

/// Expenses sharing a date, in the order the page listed them.
#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup<'a> {
    pub date: NaiveDate,
    pub expenses: Vec<&'a Expense>,
    pub total: Decimal,
}

/// Group a page by date. Groups appear in order of first occurrence so
/// the server's sort is kept.
pub fn group_by_date(expenses: &[Expense]) -> Vec<DateGroup<'_>> {
    let mut groups: Vec<DateGroup> = Vec::new();
    for expense in expenses {
        match groups.iter_mut().find(|g| g.date == expense.date) {
            Some(group) => {
                group.total += expense.amount;
                group.expenses.push(expense);
            }
            None => groups.push(DateGroup {
                date: expense.date,
                expenses: vec![expense],
                total: expense.amount,
            }),
        }
    }
    groups
}

pub fn total(expenses: &[Expense]) -> Decimal {
    expenses.iter().map(|e| e.amount).sum()
}
