// session-server/src/api/sessions.rs
use actix::Addr;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use common::models::session::{IntentRequest, SessionConfig, SessionResponse};
use common::{generate_session_token, Config};
use serde::Deserialize;
use serde_json::json;
use session_engine::gas::estimate_gas_savings;
use session_engine::SessionError;
use uuid::Uuid;

use crate::auth::authorize_session;
use crate::registry::{
    ApiError, CloseSession, ExecuteIntent, GetRegistryMetrics, GetSessionLog, GetSessionStatus,
    OpenSession, SessionRegistryActor,
};

#[get("/")]
pub async fn api_index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Gasless Session Platform API",
        "version": "0.1.0"
    }))
}

// Map engine errors onto HTTP statuses the frontend branches on
fn session_error_response(err: &SessionError) -> HttpResponse {
    let body = json!({
        "error": err.to_string(),
        "retryable": err.is_retryable(),
    });

    match err {
        SessionError::InvalidConfig(_) | SessionError::InvalidAmount => {
            HttpResponse::BadRequest().json(body)
        }
        SessionError::SessionNotActive
        | SessionError::AlreadyClosed
        | SessionError::AllowanceExceeded { .. } => HttpResponse::Conflict().json(body),
        SessionError::SessionExpired => HttpResponse::Gone().json(body),
        SessionError::AnchorUnreachable(_) | SessionError::SettlementFailed(_) => {
            HttpResponse::BadGateway().json(body)
        }
        SessionError::LedgerLogDivergence { .. } => HttpResponse::InternalServerError().json(body),
    }
}

fn api_error_response(err: &ApiError) -> HttpResponse {
    match err {
        ApiError::NotFound => HttpResponse::NotFound().json(json!({
            "error": "Session not found"
        })),
        ApiError::Session(e) => session_error_response(e),
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| {
        HttpResponse::BadRequest().json(json!({
            "error": "Invalid session ID format"
        }))
    })
}

// Open a gasless session and hand back a wallet-bound token for it
#[post("/session")]
pub async fn open_session(
    body: web::Json<SessionConfig>,
    registry: web::Data<Addr<SessionRegistryActor>>,
    config: web::Data<Config>,
) -> impl Responder {
    let session_config = body.into_inner();
    let wallet = session_config.user_address.clone();

    match registry
        .send(OpenSession {
            config: session_config,
        })
        .await
    {
        Ok(Ok(snapshot)) => {
            let token = match generate_session_token(
                &snapshot.session_id,
                &wallet,
                snapshot.expires_at,
                config.token_secret.as_bytes(),
            ) {
                Ok(token) => token,
                Err(e) => {
                    tracing::error!("Failed to issue session token: {}", e);
                    return HttpResponse::InternalServerError().json(json!({
                        "error": "Internal server error"
                    }));
                }
            };

            tracing::info!("Opened session {} for {}", snapshot.session_id, wallet);
            HttpResponse::Ok().json(json!({
                "session": SessionResponse::from(&snapshot),
                "allowance": snapshot.allowance,
                "token": token,
            }))
        }
        Ok(Err(e)) => session_error_response(&e),
        Err(e) => {
            tracing::error!("Registry unavailable: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

// Admit one off-chain intent into a session
#[post("/session/{session_id}/intent")]
pub async fn execute_intent(
    path: web::Path<(String,)>,
    body: web::Json<IntentRequest>,
    req: HttpRequest,
    registry: web::Data<Addr<SessionRegistryActor>>,
    config: web::Data<Config>,
) -> impl Responder {
    let session_id = match parse_session_id(&path.0) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(resp) = authorize_session(&req, config.token_secret.as_bytes(), session_id) {
        return resp;
    }

    match registry
        .send(ExecuteIntent {
            session_id,
            request: body.into_inner(),
        })
        .await
    {
        Ok(Ok(receipt)) => HttpResponse::Ok().json(receipt),
        Ok(Err(e)) => api_error_response(&e),
        Err(e) => {
            tracing::error!("Registry unavailable: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

// Public point-in-time view of a session
#[get("/session/{session_id}")]
pub async fn get_session_status(
    path: web::Path<(String,)>,
    registry: web::Data<Addr<SessionRegistryActor>>,
) -> impl Responder {
    let session_id = match parse_session_id(&path.0) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match registry.send(GetSessionStatus { session_id }).await {
        Ok(Ok(snapshot)) => HttpResponse::Ok().json(SessionResponse::from(&snapshot)),
        Ok(Err(e)) => api_error_response(&e),
        Err(e) => {
            tracing::error!("Registry unavailable: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

// Ordered audit view of a session's admitted intents
#[get("/session/{session_id}/log")]
pub async fn get_session_log(
    path: web::Path<(String,)>,
    req: HttpRequest,
    registry: web::Data<Addr<SessionRegistryActor>>,
    config: web::Data<Config>,
) -> impl Responder {
    let session_id = match parse_session_id(&path.0) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(resp) = authorize_session(&req, config.token_secret.as_bytes(), session_id) {
        return resp;
    }

    match registry.send(GetSessionLog { session_id }).await {
        Ok(Ok(intents)) => HttpResponse::Ok().json(intents),
        Ok(Err(e)) => api_error_response(&e),
        Err(e) => {
            tracing::error!("Registry unavailable: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

// Fold the session's log into one settlement and close it
#[post("/session/{session_id}/close")]
pub async fn close_session(
    path: web::Path<(String,)>,
    req: HttpRequest,
    registry: web::Data<Addr<SessionRegistryActor>>,
    config: web::Data<Config>,
) -> impl Responder {
    let session_id = match parse_session_id(&path.0) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(resp) = authorize_session(&req, config.token_secret.as_bytes(), session_id) {
        return resp;
    }

    match registry.send(CloseSession { session_id }).await {
        Ok(Ok(result)) => {
            tracing::info!(
                "Session {} settled via API: tx {}",
                session_id,
                result.tx_ref
            );
            HttpResponse::Ok().json(result)
        }
        Ok(Err(e)) => api_error_response(&e),
        Err(e) => {
            tracing::error!("Registry unavailable: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

#[get("/sessions/metrics")]
pub async fn registry_metrics(
    registry: web::Data<Addr<SessionRegistryActor>>,
) -> impl Responder {
    match registry.send(GetRegistryMetrics).await {
        Ok(metrics) => HttpResponse::Ok().json(metrics),
        Err(e) => {
            tracing::error!("Registry unavailable: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GasSavingsQuery {
    pub gas_price: u64,
    pub transactions: u64,
}

// What batching the given number of transactions would save
#[get("/gas-savings")]
pub async fn gas_savings(query: web::Query<GasSavingsQuery>) -> impl Responder {
    match estimate_gas_savings(query.gas_price as u128, query.transactions) {
        Some(savings) => HttpResponse::Ok().json(savings),
        None => HttpResponse::BadRequest().json(json!({
            "error": "transaction count must be greater than zero"
        })),
    }
}
