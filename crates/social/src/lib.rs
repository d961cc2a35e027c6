//! Social post lookup: find the post that carries an application's unique code.

pub mod locator;
pub mod x_client;

pub use locator::{PostLocator, SocialSearch};
pub use x_client::XSearchClient;
