//! Locating items and the pagination cursor in Metasync responses.

use serde_json::Value;

/// The two change feeds the import reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Vehicles,
    Parts,
}

impl Feed {
    /// API method name.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Vehicles => "RecuperarCambiosVehiculosCanal",
            Self::Parts => "RecuperarCambiosCanal",
        }
    }

    /// Key holding the batch, under `data` or at the top level.
    const fn items_key(self) -> &'static str {
        match self {
            Self::Vehicles => "vehiculos",
            Self::Parts => "piezas",
        }
    }

    /// Item field used as the cursor when the response has none.
    const fn id_key(self) -> &'static str {
        match self {
            Self::Vehicles => "idLocal",
            Self::Parts => "refLocal",
        }
    }
}

/// Items of `feed` in a response. Missing or malformed batches are empty.
#[must_use]
pub fn items(response: &Value, feed: Feed) -> &[Value] {
    let key = feed.items_key();
    response
        .get("data")
        .and_then(|d| d.get(key))
        .or_else(|| response.get(key))
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Cursor for the next request: `result_set.lastId`, then
/// `paginacion.lastId`, then the id of the last item.
#[must_use]
pub fn next_last_id(response: &Value, feed: Feed) -> Option<i64> {
    let explicit = ["result_set", "paginacion"]
        .iter()
        .filter_map(|k| response.get(*k).and_then(|p| p.get("lastId")))
        .find_map(as_id);
    explicit.or_else(|| {
        items(response, feed)
            .last()
            .and_then(|item| item.get(feed.id_key()))
            .and_then(as_id)
    })
}

/// Whether paging must stop after a batch.
#[must_use]
pub fn is_exhausted(batch_len: usize, current: i64, next: Option<i64>) -> bool {
    batch_len == 0 || next.is_none_or(|n| n <= current)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_items_under_data_or_top_level() {
        let nested = json!({ "data": { "vehiculos": [{ "idLocal": 1 }] } });
        assert_eq!(items(&nested, Feed::Vehicles).len(), 1);
        let flat = json!({ "piezas": [{ "refLocal": 1 }, { "refLocal": 2 }] });
        assert_eq!(items(&flat, Feed::Parts).len(), 2);
        assert!(items(&flat, Feed::Vehicles).is_empty());
        assert!(items(&json!({ "piezas": "oops" }), Feed::Parts).is_empty());
    }

    #[test]
    fn test_cursor_precedence() {
        let response = json!({
            "result_set": { "lastId": 900 },
            "paginacion": { "lastId": 800 },
            "piezas": [{ "refLocal": 700 }],
        });
        assert_eq!(next_last_id(&response, Feed::Parts), Some(900));

        let response = json!({ "paginacion": { "lastId": "800" }, "piezas": [{ "refLocal": 700 }] });
        assert_eq!(next_last_id(&response, Feed::Parts), Some(800));

        let response = json!({ "data": { "vehiculos": [{ "idLocal": 3 }, { "idLocal": 41 }] } });
        assert_eq!(next_last_id(&response, Feed::Vehicles), Some(41));
    }

    #[test]
    fn test_stops_on_empty_or_stalled_cursor() {
        assert!(is_exhausted(0, 10, Some(20)));
        assert!(is_exhausted(5, 10, Some(10)));
        assert!(is_exhausted(5, 10, None));
        assert!(!is_exhausted(5, 10, Some(11)));
    }
}
