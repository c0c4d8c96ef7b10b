use std::sync::Arc;

use crate::application::favorites::FavoriteService;
use crate::application::feedback::FeedbackService;
use crate::application::notifications::NotificationService;
use crate::application::properties::PropertyService;
use crate::application::reviews::ReviewService;
use crate::application::users::UserService;
use crate::infra::media::MediaStorage;

use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub users: Arc<UserService>,
    pub properties: Arc<PropertyService>,
    pub favorites: Arc<FavoriteService>,
    pub reviews: Arc<ReviewService>,
    pub notifications: Arc<NotificationService>,
    pub feedback: Arc<FeedbackService>,
    pub media_storage: Arc<MediaStorage>,
    pub rate_limiter: Arc<ApiRateLimiter>,
}
