//! Star ratings and their persisted integer form.
//!
//! The stored representation is always the plain star count. Anything that
//! does not match a variant decodes to "no rating" rather than an error, so
//! older or hand-edited records never fail to load.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Rating {
    OneStar,
    TwoStars,
    ThreeStars,
    FourStars,
    FiveStars,
}

impl Rating {
    pub const ALL: [Rating; 5] = [
        Rating::OneStar,
        Rating::TwoStars,
        Rating::ThreeStars,
        Rating::FourStars,
        Rating::FiveStars,
    ];

    pub fn stars(self) -> u8 {
        match self {
            Rating::OneStar => 1,
            Rating::TwoStars => 2,
            Rating::ThreeStars => 3,
            Rating::FourStars => 4,
            Rating::FiveStars => 5,
        }
    }

    pub fn from_stars(stars: i64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rating| i64::from(rating.stars()) == stars)
    }
}

/// Decode a persisted star count. Absent or out-of-range values yield `None`.
pub fn decode_rating(value: Option<i32>) -> Option<Rating> {
    value.and_then(|stars| Rating::from_stars(i64::from(stars)))
}

/// Encode a rating into its persisted star count.
pub fn encode_rating(value: Option<Rating>) -> Option<i32> {
    value.map(|rating| i32::from(rating.stars()))
}

/// Serde adapter storing `Option<Rating>` as its star count.
pub mod stars {
    use super::{decode_rating, encode_rating, Rating};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Rating>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        encode_rating(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Rating>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(decode_rating(Option::<i32>::deserialize(deserializer)?))
    }
}
