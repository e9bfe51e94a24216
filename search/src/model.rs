use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

/// Raw `/search` response: category name to a list of entries, in the order
/// the server sent them.
pub type SearchResponse = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Continent,
    Country,
    Language,
    /// Any other response key, kept verbatim.
    Other(String),
}

impl Category {
    /// Maps a response key (`"countries"`, `"Country"`, ...) to a category.
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "continent" | "continents" => Category::Continent,
            "country" | "countries" => Category::Country,
            "language" | "languages" => Category::Language,
            _ => Category::Other(key.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionItem {
    pub name: Option<String>,
    pub category: Category,
    /// Every field of the entry other than `name`.
    pub attributes: Map<String, Value>,
}

impl SuggestionItem {
    fn from_entry(category: Category, entry: Value) -> Option<Self> {
        let Value::Object(mut attributes) = entry else {
            return None;
        };
        let name = match attributes.remove("name") {
            Some(Value::String(name)) => Some(name),
            _ => None,
        };
        Some(Self {
            name,
            category,
            attributes,
        })
    }
}

/// Flattens every category into one list: key order first, then array order.
/// Every key contributes, including ones with no known [`Category`]. Null
/// entries are dropped; duplicates are kept.
pub fn flatten_suggestions(response: SearchResponse) -> Vec<SuggestionItem> {
    let mut items = Vec::new();
    for (key, value) in response {
        let category = Category::from_key(&key);
        if matches!(category, Category::Other(_)) {
            debug!("unrecognised suggestion category {key:?}");
        }
        match value {
            Value::Array(entries) => items.extend(
                entries
                    .into_iter()
                    .filter_map(|entry| SuggestionItem::from_entry(category.clone(), entry)),
            ),
            Value::Null => {}
            entry => items.extend(SuggestionItem::from_entry(category, entry)),
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn names(items: &[SuggestionItem]) -> Vec<(Category, Option<&str>)> {
        items
            .iter()
            .map(|item| (item.category.clone(), item.name.as_deref()))
            .collect()
    }

    #[test]
    fn preserves_key_then_array_order() {
        // Parsed from text: `json!` would sort the keys.
        let response: SearchResponse = serde_json::from_str(
            r#"{
                "languages": [{"name": "Spanish"}, {"name": "Swahili"}],
                "countries": [{"name": "Spain", "code": "ES"}],
                "continents": [{"name": "South America"}]
            }"#,
        )
        .unwrap();

        let items = flatten_suggestions(response);
        assert_eq!(
            vec![
                (Category::Language, Some("Spanish")),
                (Category::Language, Some("Swahili")),
                (Category::Country, Some("Spain")),
                (Category::Continent, Some("South America")),
            ],
            names(&items)
        );
        assert_eq!(Some(&json!("ES")), items[2].attributes.get("code"));
    }

    #[test]
    fn drops_nulls_and_keeps_duplicates() {
        let response: SearchResponse = serde_json::from_str(
            r#"{
                "countries": [null, {"name": "Georgia"}, null],
                "languages": null,
                "continents": [{"name": "Georgia"}]
            }"#,
        )
        .unwrap();

        let items = flatten_suggestions(response);
        assert_eq!(
            vec![
                (Category::Country, Some("Georgia")),
                (Category::Continent, Some("Georgia")),
            ],
            names(&items)
        );
    }

    #[test]
    fn entries_without_a_name_are_kept() {
        let response: SearchResponse =
            serde_json::from_value(json!({"countries": [{"code": "XX"}]})).unwrap();
        let items = flatten_suggestions(response);
        assert_eq!(vec![(Category::Country, None)], names(&items));
    }

    #[test]
    fn unknown_categories_are_kept() {
        let response: SearchResponse = serde_json::from_value(json!({
            "planets": [{"name": "Mars"}],
            "Country": [{"name": "Mali"}],
        }))
        .unwrap();
        let items = flatten_suggestions(response);
        assert_eq!(
            vec![
                (Category::Country, Some("Mali")),
                (Category::Other("planets".to_string()), Some("Mars")),
            ],
            names(&items)
        );
    }
}
