pub mod attributes;
pub mod catalog;
pub mod profile;
pub mod store;

pub use attributes::*;
pub use catalog::*;
pub use profile::*;
pub use store::*;
