pub mod predictions;
pub mod schema;
