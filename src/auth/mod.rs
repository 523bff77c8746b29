pub mod provider;
pub mod session;
pub mod user;

pub use provider::*;
pub use session::*;
pub use user::*;
