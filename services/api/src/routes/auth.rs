use accounts::Registration;
use actix_web::cookie::{time::Duration, Cookie};
use actix_web::{post, web, HttpRequest, HttpResponse};
use auth::SessionTokens;
use common::User;

use crate::error::HttpApiError;
use crate::middleware::{ACCESS_COOKIE, REFRESH_COOKIE};
use crate::response;
use crate::schemas::{LoginInput, RefreshInput, RegisterInput, SessionOut, TokensOut};
use crate::state::AppState;

fn cookie(state: &AppState, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
    Cookie::build(name, value)
        .domain(state.cookie_domain.clone())
        .secure(state.cookie_secure)
        .http_only(true)
        .path("/")
        .max_age(Duration::seconds(max_age))
        .finish()
}

/// Envelope carrying the user and the new pair, with both tokens also set
/// as cookies.
fn session_response(
    state: &AppState,
    mut builder: actix_web::HttpResponseBuilder,
    message: &str,
    user: &User,
    tokens: SessionTokens,
) -> HttpResponse {
    builder
        .cookie(cookie(state, ACCESS_COOKIE, tokens.access.clone(), state.access_ttl))
        .cookie(cookie(state, REFRESH_COOKIE, tokens.refresh.clone(), state.refresh_ttl));
    builder.json(response::Envelope {
        success: true,
        message: message.to_string(),
        errors: None,
        data: Some(SessionOut {
            user,
            tokens: TokensOut {
                access: tokens.access,
                refresh: tokens.refresh,
            },
        }),
    })
}

fn presented_refresh(req: &HttpRequest, body: Option<web::Json<RefreshInput>>) -> Option<String> {
    body.and_then(|b| b.into_inner().refresh)
        .or_else(|| req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string()))
}

#[post("/api/auth/register")]
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterInput>,
) -> Result<HttpResponse, HttpApiError> {
    let registration = Registration::from(payload.into_inner());
    let user = data.accounts.register(registration).await?;
    let tokens = data.accounts.issue_session(&user).await?;
    Ok(session_response(
        &data,
        HttpResponse::Created(),
        "User registered successfully",
        &user,
        tokens,
    ))
}

#[post("/api/auth/login")]
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginInput>,
) -> Result<HttpResponse, HttpApiError> {
    let LoginInput { email, password } = payload.into_inner();
    let (user, tokens) = data.accounts.login(&email, &password).await?;
    Ok(session_response(
        &data,
        HttpResponse::Ok(),
        "Login successful",
        &user,
        tokens,
    ))
}

#[post("/api/auth/token/refresh")]
pub async fn refresh(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: Option<web::Json<RefreshInput>>,
) -> Result<HttpResponse, HttpApiError> {
    let token = presented_refresh(&req, body).ok_or(HttpApiError::MissingCredentials)?;
    let (user, tokens) = data.accounts.refresh(&token).await?;
    Ok(session_response(
        &data,
        HttpResponse::Ok(),
        "Token refreshed",
        &user,
        tokens,
    ))
}

#[post("/api/auth/logout")]
pub async fn logout(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: Option<web::Json<RefreshInput>>,
) -> Result<HttpResponse, HttpApiError> {
    if let Some(token) = presented_refresh(&req, body) {
        data.accounts.logout(&token).await?;
    }
    let clear = |name: &'static str| cookie(&data, name, String::new(), 0);
    let mut resp = response::ok("Logged out", serde_json::Value::Null);
    resp.add_cookie(&clear(ACCESS_COOKIE)).ok();
    resp.add_cookie(&clear(REFRESH_COOKIE)).ok();
    Ok(resp)
}
