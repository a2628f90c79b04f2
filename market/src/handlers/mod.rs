mod admin;
mod auth;
mod collections;
mod likes;
mod mint_jobs;
mod payments;

use actix_web::{HttpResponse, Responder, get};
pub use admin::*;
pub use auth::*;
pub use collections::*;
pub use likes::*;
pub use mint_jobs::*;
pub use payments::*;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Welcome to the NFT Marketplace Service!")
}
