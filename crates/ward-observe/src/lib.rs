mod logger;
pub use logger::*;

#[cfg(feature = "journal")]
mod journal;
#[cfg(feature = "journal")]
pub use journal::*;
