use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
    widgets::ListItem,
};
use serde::{Deserialize, Serialize};

use super::{Entity, Upsert, id_from_string_or_number};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "id_from_string_or_number", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Category {
            id: Some(id.into()),
            name: name.into(),
        }
    }

    pub fn to_list_item(&self) -> ListItem {
        ListItem::new(Line::from(vec![
            Span::raw(format!("{:<40} ", self.name)),
            Span::styled(
                self.id.as_deref().map(|id| format!("#{id}")).unwrap_or_default(),
                Style::default().fg(Color::DarkGray),
            ),
        ]))
    }
}

impl Entity for Category {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryUpsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

impl Upsert for CategoryUpsert {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_are_kept_as_strings() {
        let category: Category = serde_json::from_str(r#"{"id": 42, "name": "Groceries"}"#).unwrap();
        assert_eq!(category, Category::new("42", "Groceries"));

        let category: Category = serde_json::from_str(r#"{"id": "abc", "name": "Rent"}"#).unwrap();
        assert_eq!(category.id(), Some("abc"));
    }

    #[test]
    fn create_body_omits_id() {
        let dto = CategoryUpsert { id: None, name: "Travel".into() };
        assert_eq!(serde_json::to_string(&dto).unwrap(), r#"{"name":"Travel"}"#);
    }
}
