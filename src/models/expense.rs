use chrono::NaiveDate;
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
    widgets::ListItem,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Entity, Upsert, category::Category, id_from_string_or_number};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default, deserialize_with = "id_from_string_or_number", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub category: Option<Category>,
}

impl Expense {
    pub fn category_name(&self) -> &str {
        self.category.as_ref().map(|c| c.name.as_str()).unwrap_or("Uncategorized")
    }

    pub fn to_list_item(&self) -> ListItem {
        ListItem::new(Line::from(vec![
            Span::raw(format!("  {:<30} ", self.name)),
            Span::styled(format!("{:>10.2} ", self.amount), Style::default().fg(Color::Red)),
            Span::styled(self.category_name().to_string(), Style::default().fg(Color::Cyan)),
        ]))
    }
}

impl Entity for Expense {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseUpsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl Upsert for ExpenseUpsert {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
