pub mod check;
pub mod compare;
pub mod core;
pub mod error;
pub mod key;
pub mod merge;
pub mod pool;
pub mod run;
pub mod settings;

#[cfg(test)]
mod tests;

pub use self::check::*;
pub use self::compare::*;
pub use self::core::*;
pub use self::error::*;
pub use self::key::*;
pub use self::merge::*;
pub use self::pool::*;
pub use self::run::*;
pub use self::settings::*;
