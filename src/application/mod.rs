pub mod auth;
pub mod error;
pub mod favorites;
pub mod feedback;
pub mod mailer;
pub mod notifications;
pub mod pagination;
pub mod properties;
pub mod repos;
pub mod reviews;
pub mod users;
