use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::http::header::{LOCATION, REFERER};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::errors::{AppError, FieldErrors};

/// Outcome of a mutating form submission. Both variants are recoverable by
/// the caller: a redirect with a flash message, or the field errors plus the
/// submitted input.
#[derive(Debug)]
pub enum FormResponse {
    Redirect { to: String, flash: &'static str },
    Invalid { errors: FieldErrors, old: Value },
}

impl FormResponse {
    pub fn back(headers: &HeaderMap, fallback: &str, flash: &'static str) -> Self {
        FormResponse::Redirect {
            to: back_to(headers, fallback),
            flash,
        }
    }

    pub fn invalid<T: Serialize>(errors: FieldErrors, old: &T) -> Self {
        FormResponse::Invalid {
            errors,
            old: serde_json::to_value(old).unwrap_or(Value::Null),
        }
    }
}

impl IntoResponse for FormResponse {
    fn into_response(self) -> Response {
        match self {
            FormResponse::Redirect { to, flash } => {
                let location = HeaderValue::from_str(&to).unwrap_or(HeaderValue::from_static("/"));
                (
                    StatusCode::SEE_OTHER,
                    [(LOCATION, location)],
                    Json(json!({ "flash": { "success": flash } })),
                )
                    .into_response()
            }
            FormResponse::Invalid { errors, old } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors, "old": old })),
            )
                .into_response(),
        }
    }
}

const UNREADABLE_FORM: &str = "Os dados enviados são inválidos.";

/// JSON form body whose rejection is reported like any other invalid form.
pub struct FormBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for FormBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = FormResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(FormBody(value)),
            Err(rejection) => {
                warn!("Rejected form body: {}", rejection.body_text());
                Err(FormResponse::Invalid {
                    errors: FieldErrors::single("form", UNREADABLE_FORM),
                    old: Value::Null,
                })
            }
        }
    }
}

/// The page the form was submitted from, or `fallback` without a Referer.
pub fn back_to(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// How service failures of one action are reported back on the form.
pub struct FormFailure {
    pub field: &'static str,
    pub denied: &'static str,
    pub failed: &'static str,
}

impl FormFailure {
    /// Folds any service error into field errors. Missing and foreign
    /// resources read the same; store failures only surface as a retry hint.
    pub fn errors(&self, err: AppError) -> FieldErrors {
        match err {
            AppError::Validation(errors) => errors,
            AppError::Forbidden | AppError::NotFound | AppError::Unauthorized => {
                warn!("Denied on {}: {}", self.field, err);
                FieldErrors::single(self.field, self.denied)
            }
            AppError::Db(_) | AppError::Internal(_) => {
                error!("Failed on {}: {}", self.field, err);
                FieldErrors::single(self.field, self.failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAILURE: FormFailure = FormFailure {
        field: "client",
        denied: "sem permissão",
        failed: "tente novamente",
    };

    #[test]
    fn test_back_prefers_referer() {
        let mut headers = HeaderMap::new();
        assert_eq!(back_to(&headers, "/clients"), "/clients");

        headers.insert(REFERER, HeaderValue::from_static("/investments?page=2"));
        assert_eq!(back_to(&headers, "/clients"), "/investments?page=2");
    }

    #[test]
    fn test_not_found_reads_like_forbidden() {
        let denied = FAILURE.errors(AppError::Forbidden);
        let missing = FAILURE.errors(AppError::NotFound);

        assert_eq!(denied.get("client"), Some("sem permissão"));
        assert_eq!(missing.get("client"), Some("sem permissão"));
    }

    #[test]
    fn test_store_failure_hides_detail() {
        let errors = FAILURE.errors(AppError::Db(sqlx::Error::PoolTimedOut));
        assert_eq!(errors.get("client"), Some("tente novamente"));
    }

    #[test]
    fn test_validation_errors_pass_through() {
        let errors = FAILURE.errors(AppError::invalid("email", "duplicado"));
        assert_eq!(errors.get("email"), Some("duplicado"));
        assert!(!errors.has("client"));
    }

    #[tokio::test]
    async fn test_unreadable_body_is_reported_on_the_form() {
        let request = axum::http::Request::builder()
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{\"name\": "))
            .unwrap();
        let rejection = FormBody::<crate::validation::StoreClientForm>::from_request(request, &())
            .await
            .err()
            .unwrap();

        match rejection {
            FormResponse::Invalid { errors, old } => {
                assert_eq!(errors.get("form"), Some(UNREADABLE_FORM));
                assert_eq!(old, Value::Null);
            }
            other => panic!("expected an invalid form, got {:?}", other),
        }
    }

    #[test]
    fn test_redirect_is_see_other() {
        let response = FormResponse::back(&HeaderMap::new(), "/clients", "ok").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/clients");
    }
}
