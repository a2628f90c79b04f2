mod db;
mod helpers;
mod nft;
mod schema;
mod solana;

pub use db::*;
pub use helpers::*;
pub use nft::*;
pub use schema::*;
pub use solana::*;
