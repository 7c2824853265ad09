//! Caller identity supplied by the upstream authentication layer.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the stable user identifier; absent means unauthenticated.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the display name shown to opponents.
pub const USER_NAME_HEADER: &str = "x-user-name";
/// Header carrying the avatar URL shown to opponents.
pub const USER_IMAGE_HEADER: &str = "x-user-image";

/// Identity of the authenticated caller of a race operation.
///
/// The backend does not authenticate anybody itself; it trusts the reverse
/// proxy in front of it to resolve the session and forward these headers.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name, falling back to the identifier when not forwarded.
    pub name: String,
    /// Avatar URL, when forwarded.
    pub image: Option<String>,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        let user_id = header(USER_ID_HEADER).ok_or_else(|| {
            AppError::Unauthenticated(format!("missing identity header `{USER_ID_HEADER}`"))
        })?;
        let name = header(USER_NAME_HEADER).unwrap_or_else(|| user_id.clone());
        let image = header(USER_IMAGE_HEADER);

        Ok(Self {
            user_id,
            name,
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_user_id_is_unauthenticated() {
        let mut parts = parts(&[(USER_NAME_HEADER, "Alice")]);
        let err = Identity::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn blank_user_id_is_unauthenticated() {
        let mut parts = parts(&[(USER_ID_HEADER, "   ")]);
        let err = Identity::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn name_falls_back_to_the_user_id() {
        let mut parts = parts(&[(USER_ID_HEADER, "user-1")]);
        let identity = Identity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.name, "user-1");
        assert!(identity.image.is_none());
    }

    #[tokio::test]
    async fn forwarded_headers_are_trimmed_and_kept() {
        let mut parts = parts(&[
            (USER_ID_HEADER, " user-1 "),
            (USER_NAME_HEADER, "Alice"),
            (USER_IMAGE_HEADER, "https://example.com/a.png"),
        ]);
        let identity = Identity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.name, "Alice");
        assert_eq!(identity.image.as_deref(), Some("https://example.com/a.png"));
    }
}
