pub mod account_handlers;
pub mod album_handlers;
pub mod health_handlers;
pub mod image_handlers;
