mod versioned_schema;

pub use versioned_schema::{
    open_read_only, open_versioned, Column, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
};
