pub mod orm_config;
pub mod sources;
pub mod validation;

pub use orm_config::*;
pub use sources::*;
pub use validation::*;
