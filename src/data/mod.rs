//! Data access layer.

pub mod db {
    pub use crate::db::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}

pub mod vehicles {
    pub use crate::vehicles::*;
}

pub mod query {
    pub use crate::query::*;
}
