pub mod auth;
pub mod error;
pub mod http;
pub mod traits;

pub use auth::{AuthSession, AuthSessionProvider, Credential};
pub use error::RemoteError;
pub use http::HttpReviewClient;
pub use traits::{RemoteReview, RemoteReviewClient, SubmittedReview};
