//! Catalog data model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A record album. The id is externally supplied (never generated) and
/// acts as the primary key of the persisted row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn album_json_round_trip() {
        let json = r#"{"id":"99","title":"T","artist":"A","price":9.99}"#;
        let album: Album = serde_json::from_str(json).unwrap();
        assert_eq!(album.id, "99");
        assert_eq!(album.title, "T");
        assert_eq!(album.artist, "A");
        assert_eq!(album.price, 9.99);

        let back = serde_json::to_value(&album).unwrap();
        assert_eq!(back["price"], 9.99);
        assert_eq!(back["id"], "99");
    }
}
