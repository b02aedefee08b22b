pub mod cookies;
pub mod email;
pub mod jwt;
pub mod time;
pub mod token;

pub use jwt::*;
pub use time::*;
pub use token::*;
