pub mod actor;
pub mod genre;
pub mod performance;
pub mod play;
pub mod reservation;
pub mod theatre_hall;
pub mod ticket;
pub mod user;

pub use actor::Actor;
pub use genre::Genre;
pub use performance::{Performance, PerformanceListItem};
pub use play::{Play, PlayDetail};
pub use reservation::Reservation;
pub use theatre_hall::TheatreHall;
pub use ticket::Ticket;
pub use user::User;

use serde::{Deserialize, Deserializer};
use std::{collections::HashMap, hash::Hash};

/// `deserialize_with` for names: surrounding whitespace never reaches validation.
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

pub(crate) fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|s| s.map(|s| s.trim().to_string()))
}

// Группировка строк связанных таблиц по внешнему ключу
pub(crate) fn group_by<T, K, V>(
    rows: Vec<T>,
    key: impl Fn(&T) -> K,
    value: impl Fn(T) -> V,
) -> HashMap<K, Vec<V>>
where
    K: Hash + Eq,
{
    let mut map: HashMap<K, Vec<V>> = HashMap::new();
    for row in rows {
        map.entry(key(&row)).or_default().push(value(row));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Named {
        #[serde(deserialize_with = "trimmed")]
        name: String,
        #[serde(default, deserialize_with = "trimmed_opt")]
        alias: Option<String>,
    }

    #[test]
    fn names_are_trimmed_on_the_way_in() {
        let named: Named = serde_json::from_str(r#"{"name": "  Drama ", "alias": " "}"#).unwrap();
        assert_eq!(named.name, "Drama");
        assert_eq!(named.alias.as_deref(), Some(""));

        let bare: Named = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(bare.alias, None);
    }

    #[test]
    fn group_by_keeps_order_within_group() {
        let grouped = group_by(vec![(1, 'a'), (2, 'b'), (1, 'c')], |(k, _)| *k, |(_, v)| v);
        assert_eq!(grouped[&1], vec!['a', 'c']);
        assert_eq!(grouped[&2], vec!['b']);
    }
}
