use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// A sort key as the backend expects it: `field,asc` or `field,desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: &str) -> Self {
        Sort { field: field.to_string(), direction: SortDirection::Ascending }
    }

    pub fn desc(field: &str) -> Self {
        Sort { field: field.to_string(), direction: SortDirection::Descending }
    }

    pub fn label(&self) -> String {
        let arrow = match self.direction {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        };
        format!("{} {}", self.field, arrow)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.field, self.direction.as_str())
    }
}

impl FromStr for Sort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(',') {
            Some((field, dir)) => (field.trim(), dir.trim()),
            None => (s.trim(), "asc"),
        };
        if field.is_empty() {
            return Err(format!("invalid sort '{s}': missing field"));
        }
        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Ascending,
            "desc" => SortDirection::Descending,
            other => return Err(format!("invalid sort direction '{other}'")),
        };
        Ok(Sort { field: field.to_string(), direction })
    }
}

/// Sort orders a list screen cycles through with the `s` key.
pub const CATEGORY_SORTS: &[(&str, SortDirection)] = &[
    ("name", SortDirection::Ascending),
    ("name", SortDirection::Descending),
];

pub const EXPENSE_SORTS: &[(&str, SortDirection)] = &[
    ("date", SortDirection::Descending),
    ("date", SortDirection::Ascending),
    ("amount", SortDirection::Descending),
    ("amount", SortDirection::Ascending),
    ("name", SortDirection::Ascending),
    ("name", SortDirection::Descending),
];

/// Next sort in `options` after `current`; unknown sorts restart the cycle.
pub fn next_sort(options: &[(&str, SortDirection)], current: &Sort) -> Sort {
    let position = options
        .iter()
        .position(|(field, dir)| *field == current.field && *dir == current.direction);
    let (field, direction) = match position {
        Some(i) => options[(i + 1) % options.len()],
        None => options[0],
    };
    Sort { field: field.to_string(), direction }
}

/// Criteria state shared by the paged list screens.
pub trait ListCriteria: Clone + Send + Sync + 'static {
    fn name(&self) -> Option<&str>;
    fn set_name(&mut self, name: Option<String>);
    fn sort(&self) -> &Sort;
    fn set_sort(&mut self, sort: Sort);
    fn page(&self) -> u32;
    fn set_page(&mut self, page: u32);
    fn size(&self) -> u32;
}

/// Filter for the unpaged category list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllCategoryCriteria {
    pub sort: Option<Sort>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCriteria {
    pub page: u32,
    pub size: u32,
    pub sort: Sort,
    pub name: Option<String>,
}

impl Default for CategoryCriteria {
    fn default() -> Self {
        CategoryCriteria {
            page: 0,
            size: 100,
            sort: Sort::asc("name"),
            name: None,
        }
    }
}

impl ListCriteria for CategoryCriteria {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    fn sort(&self) -> &Sort {
        &self.sort
    }

    fn set_sort(&mut self, sort: Sort) {
        self.sort = sort;
    }

    fn page(&self) -> u32 {
        self.page
    }

    fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    fn size(&self) -> u32 {
        self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseCriteria {
    pub page: u32,
    pub size: u32,
    pub sort: Sort,
    pub category_ids: Vec<String>,
    pub name: Option<String>,
    /// Month filter in `YYYY-MM` form.
    pub year_month: Option<String>,
}

impl Default for ExpenseCriteria {
    fn default() -> Self {
        ExpenseCriteria {
            page: 0,
            size: 100,
            sort: Sort::desc("date"),
            category_ids: Vec::new(),
            name: None,
            year_month: None,
        }
    }
}

impl ListCriteria for ExpenseCriteria {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    fn sort(&self) -> &Sort {
        &self.sort
    }

    fn set_sort(&mut self, sort: Sort) {
        self.sort = sort;
    }

    fn page(&self) -> u32 {
        self.page
    }

    fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    fn size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_round_trips_through_wire_form() {
        let sort: Sort = "name,asc".parse().unwrap();
        assert_eq!(sort, Sort::asc("name"));
        assert_eq!(Sort::desc("date").to_string(), "date,desc");
        assert_eq!("amount".parse::<Sort>().unwrap(), Sort::asc("amount"));
    }

    #[test]
    fn rejects_bad_sorts() {
        assert!("name,sideways".parse::<Sort>().is_err());
        assert!(",asc".parse::<Sort>().is_err());
    }

    #[test]
    fn sort_cycle_wraps() {
        let next = next_sort(CATEGORY_SORTS, &Sort::asc("name"));
        assert_eq!(next, Sort::desc("name"));
        assert_eq!(next_sort(CATEGORY_SORTS, &next), Sort::asc("name"));
        assert_eq!(next_sort(EXPENSE_SORTS, &Sort::asc("unknown")), Sort::desc("date"));
    }
}
