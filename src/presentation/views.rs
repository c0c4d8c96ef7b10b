//! Server-rendered page views.
//!
//! The frontend is a thin set of template stubs; all data flows through the
//! JSON API. Each view renders the shared layout with a page marker the
//! client-side code keys off.

use askama::{Error as AskamaError, Template};
use axum::{http::StatusCode, response::Html};
use thiserror::Error;
use uuid::Uuid;

use crate::application::error::HttpError;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage;

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage;

#[derive(Template)]
#[template(path = "properties.html")]
pub struct PropertiesPage;

#[derive(Template)]
#[template(path = "property_detail.html")]
pub struct PropertyDetailPage {
    pub property_id: Uuid,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage;

#[derive(Template)]
#[template(path = "favorites.html")]
pub struct FavoritesPage;

#[derive(Template)]
#[template(path = "reviews.html")]
pub struct ReviewsPage;

#[derive(Template)]
#[template(path = "contact.html")]
pub struct ContactPage;
