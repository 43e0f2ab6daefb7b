pub mod dates;
pub mod field_path;
pub mod sql_quote;
