use axum::http::HeaderValue;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;
use crate::workflow::{Pagination, WorkflowError, WorkflowResult};

pub mod bids;
pub mod health;
pub mod tenders;

/// Raw `limit`/`offset` query values. They stay strings so a bad value
/// becomes a JSON `InvalidInput` instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageParams {
    pub fn pagination(&self) -> WorkflowResult<Pagination> {
        Pagination::parse(self.limit.as_deref(), self.offset.as_deref())
    }
}

pub(crate) fn required_param<'a>(name: &str, value: Option<&'a str>) -> WorkflowResult<&'a str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| WorkflowError::invalid(format!("{name} is required")))
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(origin = value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let tender_routes = Router::new()
        .route("/", get(tenders::list_tenders))
        .route("/my", get(tenders::my_tenders))
        .route("/new", post(tenders::create_tender))
        .route(
            "/:id",
            get(tenders::get_tender).delete(tenders::delete_tender),
        )
        .route(
            "/:id/status",
            get(tenders::get_tender_status).put(tenders::set_tender_status),
        )
        .route("/:id/edit", patch(tenders::edit_tender))
        .route("/:id/rollback/:version", put(tenders::rollback_tender))
        .route("/:id/versions", get(tenders::tender_history));

    // `/:id/list` and GET `/:id/reviews` take a tender id; every other `:id`
    // is a bid.
    let bid_routes = Router::new()
        .route("/", get(bids::list_all_bids))
        .route("/my", get(bids::my_bids))
        .route("/new", post(bids::create_bid))
        .route("/:id", get(bids::get_bid).delete(bids::delete_bid))
        .route("/:id/list", get(bids::list_tender_bids))
        .route(
            "/:id/status",
            get(bids::get_bid_status).put(bids::set_bid_status),
        )
        .route("/:id/edit", patch(bids::edit_bid))
        .route("/:id/submit_decision", put(bids::submit_decision))
        .route("/:id/feedback", put(bids::submit_feedback))
        .route("/:id/rollback/:version", put(bids::rollback_bid))
        .route("/:id/versions", get(bids::bid_history))
        .route(
            "/:id/reviews",
            get(bids::list_reviews).post(bids::add_review),
        );

    Router::new()
        .route("/api/ping", get(health::ping))
        .nest("/api/tenders", tender_routes)
        .nest("/api/bids", bid_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_param_rejects_blank_values() {
        assert!(required_param("status", None).is_err());
        assert!(required_param("status", Some("  ")).is_err());
        assert_eq!(required_param("status", Some(" Published ")).unwrap(), "Published");
    }

    #[test]
    fn page_params_fall_back_to_defaults() {
        let page = PageParams::default().pagination().unwrap();
        assert_eq!(page, Pagination::default());

        let bad = PageParams {
            limit: Some("-1".to_string()),
            offset: None,
        };
        assert!(bad.pagination().is_err());
    }
}
