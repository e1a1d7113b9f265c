use serde::{Deserialize, Deserializer};

/// Longest window a single range listing may cover, in days.
pub const MAX_RANGE_DAYS: i64 = 92;

/// Date-range filter for calendar listings. Both dates are `YYYY-MM-DD`
/// calendar days in the viewer's zone; `to` is inclusive.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: String,
    pub to: String,
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// (via `#[serde(default)]`), `null` becomes `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
