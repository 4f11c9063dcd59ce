pub mod category;
pub mod criteria;
pub mod expense;
pub mod page;

use serde::{Deserialize, Deserializer};

/// Anything the backend stores and addresses by id.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> Option<&str>;
    fn display_name(&self) -> &str;
}

/// A create-or-update request body. Presence of an id makes it an update.
pub trait Upsert: serde::Serialize + Send + Sync {
    fn id(&self) -> Option<&str>;
}

/// Ids arrive as JSON strings or numbers depending on the backend; keep them as strings.
pub(crate) fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}
