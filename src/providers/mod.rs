pub mod esi;
pub mod util;

pub use esi::{AccessToken, EsiSource, StaticToken};
