//! Database models split into separate files.

pub mod dashboard;
pub mod reset;
pub mod source;
pub mod user;

pub use self::dashboard::*;
pub use self::reset::*;
pub use self::source::*;
pub use self::user::*;
