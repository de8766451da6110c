pub mod authorization;
pub mod claims;
pub mod client;
pub mod email;
pub mod error;
pub mod form;
pub mod response;
pub mod token;
pub mod user;

pub use authorization::*;
pub use claims::*;
pub use client::*;
pub use email::*;
pub use error::*;
pub use form::*;
pub use response::*;
pub use token::*;
pub use user::*;
