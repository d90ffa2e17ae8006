use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;

use crate::jwt::validate_token;
use crate::state::AppState;

/// Validates the bearer token and stores the caller's `User` in the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !request.headers().contains_key(axum::http::header::AUTHORIZATION) {
        return Err(AppError::Auth("Missing authorization header".to_string()));
    }

    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(bearer.token(), &state.config.jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    debug!("Authenticated request for user {}", user.id);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Resolves the explicit actor for a core call from the authenticated user.
pub fn actor_from_user(user: &User) -> Result<Actor, AppError> {
    Actor::try_from(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    use crate::test_utils::{ClinicFixture, JwtTestUtils, TestUser};

    async fn whoami(Extension(user): Extension<User>) -> String {
        user.id
    }

    fn app(fixture: &ClinicFixture) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(
                fixture.state.clone(),
                auth_middleware,
            ))
            .with_state(fixture.state.clone())
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let fixture = ClinicFixture::on_monday_morning();
        let response = app(&fixture)
            .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let fixture = ClinicFixture::on_monday_morning();
        let user = TestUser::patient("p@clinic.test");
        let token = JwtTestUtils::create_test_token(&user, &fixture.state.config.jwt_secret, None);

        let response = app(&fixture)
            .oneshot(
                Request::get("/whoami")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthorized() {
        let fixture = ClinicFixture::on_monday_morning();
        let response = app(&fixture)
            .oneshot(
                Request::get("/whoami")
                    .header("Authorization", "Basic dXNlcjpwYXNz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
