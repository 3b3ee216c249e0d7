pub mod ddl;
pub mod metadata;
pub mod sessions;
