//! Read-only probes plus the catch-all for everything outside the route table.
//!
//! `/health` and `/status` are what the native client polls while the model is
//! still loading in a fresh process, so they answer 200 unconditionally and
//! report readiness in the body instead of via status codes.

use crate::error::AppError;
use crate::handlers::json_response;
use crate::state::AppState;
use actix_web::{http::header, http::Method, web, HttpRequest, HttpResponse, ResponseError};
use serde_json::json;

/// GET `/health` - liveness plus model readiness. Always 200.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    json_response(&json!({
        "status": "ok",
        "model_loaded": state.manager.is_ready(),
    }))
}

/// GET `/status` - readiness plus the fixed model identifier. Always 200.
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    json_response(&json!({
        "model_loaded": state.manager.is_ready(),
        "model_name": state.manager.model_name(),
    }))
}

/// Everything that isn't a defined route lands here: OPTIONS gets a permissive
/// preflight answer (the client's browser-hosted debug console sends them
/// without an Origin header, so this can't be left to a CORS middleware), and
/// anything else is the contract's flat 404.
pub async fn fallback(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        return HttpResponse::Ok()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"))
            .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
            .finish();
    }

    AppError::NotFound("Not found".to_string()).error_response()
}

#[cfg(test)]
mod tests {
    use crate::handlers::{self, test_support};
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, web, App};

    #[actix_web::test]
    async fn test_health_reports_ready_model() {
        let (state, _) = test_support::ready_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(handlers::configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_loaded"], true);
    }

    #[actix_web::test]
    async fn test_health_reports_unready_model() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_support::unready_state()))
                .configure(handlers::configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["model_loaded"], false);
    }

    #[actix_web::test]
    async fn test_status_includes_model_name() {
        let (state, _) = test_support::ready_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(handlers::configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/status").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["model_name"], "stub-model");
    }

    #[actix_web::test]
    async fn test_unknown_routes_return_404_for_get_and_post() {
        let (state, _) = test_support::ready_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(handlers::configure),
        )
        .await;

        for req in [
            test::TestRequest::get().uri("/nope").to_request(),
            test::TestRequest::post().uri("/nope").to_request(),
            // Defined path, undefined method: still outside the route table.
            test::TestRequest::post().uri("/health").to_request(),
            test::TestRequest::get().uri("/transcribe").to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);

            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "Not found");
        }
    }

    #[actix_web::test]
    async fn test_options_preflight_anywhere() {
        let (state, _) = test_support::ready_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(handlers::configure),
        )
        .await;

        for uri in ["/health", "/transcribe", "/anything/else"] {
            let req = test::TestRequest::default()
                .method(actix_web::http::Method::OPTIONS)
                .uri(uri)
                .to_request();
            let resp = test::call_service(&app, req).await;

            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(
                resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
                "*"
            );
            assert_eq!(
                resp.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
                "GET, POST, OPTIONS"
            );
            assert_eq!(
                resp.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
                "Content-Type"
            );

            let body = test::read_body(resp).await;
            assert!(body.is_empty());
        }
    }
}
