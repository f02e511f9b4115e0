use crate::auth::jwt::JwtService;
use crate::auth::models::{TenantContext, UserRole};
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bizdesk_core::constants::{DEFAULT_TENANT_ID, DEFAULT_USER_ID};
use bizdesk_core::models::Tenant;
use bizdesk_core::AppError;
use bizdesk_db::TenantStore;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
    pub master_api_key: Option<String>,
    pub tenants: Arc<dyn TenantStore>,
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Resolve the bearer token to a [`TenantContext`] and reject viewer mutations.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let tenant_context = match authenticate(&auth_state, request.headers()).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::debug!(error = %e, path = %request.uri().path(), "Authentication failed");
            return HttpAppError(e).into_response();
        }
    };

    if !tenant_context.role.can_write() && !is_read_only(request.method()) {
        tracing::debug!(
            tenant_id = %tenant_context.tenant_id,
            user_id = %tenant_context.user_id,
            method = %request.method(),
            "Viewer attempted a mutation"
        );
        return HttpAppError(AppError::Forbidden(
            "Viewers have read-only access".to_string(),
        ))
        .into_response();
    }

    request.extensions_mut().insert(tenant_context);
    next.run(request).await
}

async fn authenticate(auth: &AuthState, headers: &HeaderMap) -> Result<TenantContext, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid authorization header format".to_string())
        })?;

    if let Some(master) = auth.master_api_key.as_deref() {
        if secure_compare(token, master) {
            let tenant = active_tenant(auth, DEFAULT_TENANT_ID).await?;
            return Ok(TenantContext {
                tenant_id: tenant.id,
                user_id: DEFAULT_USER_ID,
                role: UserRole::Admin,
                tenant,
            });
        }
    }

    let claims = auth.jwt.validate_token(token)?;
    let role: UserRole = claims.role.parse()?;
    let tenant = active_tenant(auth, claims.tenant_id).await?;

    Ok(TenantContext {
        tenant_id: tenant.id,
        user_id: claims.sub,
        role,
        tenant,
    })
}

async fn active_tenant(auth: &AuthState, tenant_id: Uuid) -> Result<Tenant, AppError> {
    let tenant = auth
        .tenants
        .get(tenant_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown tenant".to_string()))?;

    if !tenant.is_active() {
        return Err(AppError::Unauthorized("Tenant is not active".to_string()));
    }
    Ok(tenant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use bizdesk_core::models::TenantStatus;
    use chrono::Utc;
    use std::collections::HashMap;
    use tower::ServiceExt;

    const SECRET: &str = "middleware-test-secret-32-characters";
    const MASTER: &str = "master-key-for-tests-0123456789abcdef";

    struct Tenants(HashMap<Uuid, Tenant>);

    #[async_trait]
    impl TenantStore for Tenants {
        async fn get(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
            Ok(self.0.get(&id).cloned())
        }
    }

    fn tenant(id: Uuid, status: TenantStatus) -> Tenant {
        Tenant {
            id,
            name: "Acme".to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn app(tenants: Vec<Tenant>) -> Router {
        let state = Arc::new(AuthState {
            jwt: JwtService::new(SECRET, 1),
            master_api_key: Some(MASTER.to_string()),
            tenants: Arc::new(Tenants(tenants.into_iter().map(|t| (t.id, t)).collect())),
        });
        let whoami = |ctx: TenantContext| async move { format!("{}:{}", ctx.tenant_id, ctx.role) };
        Router::new()
            .route("/", get(whoami).post(whoami))
            .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
    }

    async fn call(app: Router, method: Method, token: Option<&str>) -> (StatusCode, String) {
        let mut req = Request::builder().method(method).uri("/");
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let res = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    fn token(tenant_id: Uuid, role: UserRole) -> String {
        JwtService::new(SECRET, 1)
            .issue(Uuid::new_v4(), tenant_id, role)
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (status, _) = call(app(vec![]), Method::GET, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_master_key_maps_to_default_tenant() {
        let app = app(vec![tenant(DEFAULT_TENANT_ID, TenantStatus::Active)]);
        let (status, body) = call(app, Method::GET, Some(MASTER)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{}:admin", DEFAULT_TENANT_ID));
    }

    #[tokio::test]
    async fn test_jwt_resolves_tenant() {
        let id = Uuid::new_v4();
        let app = app(vec![tenant(id, TenantStatus::Active)]);
        let (status, body) = call(app, Method::POST, Some(&token(id, UserRole::Member))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{}:member", id));
    }

    #[tokio::test]
    async fn test_viewer_cannot_mutate() {
        let id = Uuid::new_v4();
        let viewer = token(id, UserRole::Viewer);

        let (status, _) = call(
            app(vec![tenant(id, TenantStatus::Active)]),
            Method::GET,
            Some(&viewer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            app(vec![tenant(id, TenantStatus::Active)]),
            Method::POST,
            Some(&viewer),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_inactive_or_unknown_tenant_is_rejected() {
        let suspended = Uuid::new_v4();
        let app = app(vec![tenant(suspended, TenantStatus::Suspended)]);

        let (status, _) = call(
            app.clone(),
            Method::GET,
            Some(&token(suspended, UserRole::Admin)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            app,
            Method::GET,
            Some(&token(Uuid::new_v4(), UserRole::Admin)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_header_is_rejected() {
        let app = app(vec![]);
        let req = Request::builder()
            .uri("/")
            .header(AUTHORIZATION, "Basic abc")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
