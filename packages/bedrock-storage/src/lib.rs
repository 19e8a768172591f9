pub mod db;
pub mod models;
pub mod qdrant;
pub mod queries;
pub mod schema;
pub mod tabular;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
