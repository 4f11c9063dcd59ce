use chrono::{Datelike, Local, Months, NaiveDate};

/// The month the expense list is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    first_day: NaiveDate,
}

impl MonthCursor {
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self { first_day: date.with_day(1).unwrap_or(date) }
    }

    /// Parse `YYYY-MM`.
    pub fn parse(year_month: &str) -> Option<Self> {
        NaiveDate::parse_from_str(&format!("{}-01", year_month.trim()), "%Y-%m-%d")
            .ok()
            .map(Self::containing)
    }

    pub fn shift(&mut self, months: i32) {
        let shifted = if months >= 0 {
            self.first_day.checked_add_months(Months::new(months as u32))
        } else {
            self.first_day.checked_sub_months(Months::new(months.unsigned_abs()))
        };
        if let Some(day) = shifted {
            self.first_day = day;
        }
    }

    /// Wire form for the `yearMonth` query parameter.
    pub fn year_month(&self) -> String {
        self.first_day.format("%Y-%m").to_string()
    }

    pub fn label(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }
}
