//! SQLite/Postgres persistence for users, clients, tokens and authorization codes.

mod store;

pub use store::SqlxStorage;
