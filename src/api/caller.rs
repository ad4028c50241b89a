use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

/// Request identity forwarded by the gateway in front of this service:
///
/// - `X-Organization`: tenant the request operates in
/// - `X-User`: acting user, recorded on lifecycle history entries
/// - `X-Scopes`: comma- or space-separated OAuth scopes held by the caller
///
/// Authentication itself happens upstream; absent headers fall back to the
/// development defaults.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub organization: String,
    pub user: String,
    pub scopes: Vec<String>,
}

impl CallerContext {
    pub fn new(
        organization: impl Into<String>,
        user: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            user: user.into(),
            scopes,
        }
    }
}

impl Default for CallerContext {
    fn default() -> Self {
        Self::new("default", "anonymous", Vec::new())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let organization =
            header_value(headers, "x-organization").unwrap_or_else(|| "default".to_string());
        let user = header_value(headers, "x-user").unwrap_or_else(|| "anonymous".to_string());
        let scopes = header_value(headers, "x-scopes")
            .map(|raw| {
                raw.split([',', ' '])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            organization,
            user,
            scopes,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}
