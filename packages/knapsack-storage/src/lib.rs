pub mod candidates;
pub mod db;
pub mod items;
pub mod models;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Short hex identifier for stored rows.
pub fn new_id() -> String {
	let raw = uuid::Uuid::new_v4().simple().to_string();

	raw[..16].to_string()
}
