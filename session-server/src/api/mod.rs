// session-server/src/api/mod.rs
pub mod sessions;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .service(sessions::api_index)
            .service(sessions::open_session)
            .service(sessions::execute_intent)
            .service(sessions::get_session_status)
            .service(sessions::get_session_log)
            .service(sessions::close_session)
            .service(sessions::registry_metrics)
            .service(sessions::gas_savings),
    );
}
