pub mod align;
pub mod assign;
pub mod batch;
pub mod dist;
pub mod domain;
pub mod error;
pub mod io;
pub mod network;
pub mod pipeline;
pub mod record;
pub mod stage;
pub mod weights;

pub use error::BgcError;
