pub mod feed;
pub mod movies;
pub mod subscriptions;
