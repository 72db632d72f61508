pub mod movie;
pub mod rating;
pub mod review;
pub mod status;

pub use movie::MovieId;
pub use rating::{decode_rating, encode_rating, Rating};
pub use review::{is_blank, ReviewDraft, ReviewField, ReviewPayload};
pub use status::{FailureKind, SyncStatus};
