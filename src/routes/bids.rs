use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{ClaimedIdentity, IdentityClaim};
use crate::domain::{AuthorType, BidStatus, Decision};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::workflow::{
    bids::{self, BidChanges, BidView, NewBidInput, ReviewView},
    requested,
};

use super::{required_param, PageParams};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBidRequest {
    pub name: String,
    pub description: String,
    pub tender_id: Uuid,
    pub author_type: String,
    pub author_id: Uuid,
}

#[derive(Deserialize, Default)]
pub struct EditBidRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    status: Option<String>,
}

#[derive(Deserialize)]
pub struct DecisionQuery {
    decision: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuery {
    bid_feedback: Option<String>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub review: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsQuery {
    author_username: Option<String>,
}

pub async fn list_all_bids(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Vec<BidView>>> {
    let page = page.pagination()?;
    let mut conn = state.db()?;
    Ok(Json(bids::list_all_bids(&mut conn, page)?))
}

pub async fn my_bids(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Vec<BidView>>> {
    let page = page.pagination()?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::list_bids_for_caller(&mut conn, &caller, page)?))
}

/// The acting identity defaults to the declared author when the query names
/// nobody.
pub async fn create_bid(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Json(payload), _): WithRejection<Json<CreateBidRequest>, AppError>,
) -> AppResult<(StatusCode, Json<BidView>)> {
    let author_type: AuthorType = requested(&payload.author_type)?;
    let claim = if claim.is_empty() {
        IdentityClaim::author(payload.author_id, author_type)
    } else {
        claim
    };

    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    let bid = bids::create_bid(
        &mut conn,
        &caller,
        NewBidInput {
            name: payload.name,
            description: payload.description,
            tender_id: payload.tender_id,
            author_type,
            author_id: payload.author_id,
        },
    )?;
    Ok((StatusCode::CREATED, Json(bid)))
}

pub async fn get_bid(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<BidView>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::get_bid(&mut conn, &caller, bid_id)?))
}

pub async fn delete_bid(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    bids::delete_bid(&mut conn, &caller, bid_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tender_bids(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Vec<BidView>>> {
    let page = page.pagination()?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::list_bids_for_tender(
        &mut conn, &caller, tender_id, page,
    )?))
}

pub async fn get_bid_status(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<BidStatus>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::bid_status(&mut conn, &caller, bid_id)?))
}

pub async fn set_bid_status(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<BidView>> {
    let next: BidStatus = requested(required_param("status", query.status.as_deref())?)?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::set_bid_status(&mut conn, &caller, bid_id, next)?))
}

pub async fn edit_bid(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<EditBidRequest>, AppError>,
) -> AppResult<Json<BidView>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    let bid = bids::edit_bid(
        &mut conn,
        &caller,
        bid_id,
        BidChanges {
            name: payload.name,
            description: payload.description,
        },
    )?;
    Ok(Json(bid))
}

pub async fn submit_decision(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
    Query(query): Query<DecisionQuery>,
) -> AppResult<Json<BidView>> {
    let decision: Decision = requested(required_param("decision", query.decision.as_deref())?)?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::submit_decision(
        &mut conn, &caller, bid_id, decision,
    )?))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
    Query(query): Query<FeedbackQuery>,
) -> AppResult<Json<BidView>> {
    let feedback = required_param("bidFeedback", query.bid_feedback.as_deref())?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::submit_feedback(
        &mut conn, &caller, bid_id, feedback,
    )?))
}

pub async fn rollback_bid(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path((bid_id, version)), _): WithRejection<Path<(Uuid, i32)>, AppError>,
) -> AppResult<Json<BidView>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::rollback_bid(&mut conn, &caller, bid_id, version)?))
}

pub async fn bid_history(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Vec<BidView>>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::list_bid_versions(&mut conn, &caller, bid_id)?))
}

pub async fn add_review(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(bid_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<ReviewRequest>, AppError>,
) -> AppResult<(StatusCode, Json<ReviewView>)> {
    if payload.review.trim().is_empty() {
        return Err(AppError::bad_request("review must not be empty"));
    }

    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    let review = bids::add_review(&mut conn, &caller, bid_id, &payload.review)?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// `{id}` is the tender here, shared with the POST route on the same path.
pub async fn list_reviews(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
    Query(query): Query<ReviewsQuery>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Vec<ReviewView>>> {
    let author_username = required_param("authorUsername", query.author_username.as_deref())?;
    let page = page.pagination()?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(bids::list_reviews(
        &mut conn,
        &caller,
        tender_id,
        author_username,
        page,
    )?))
}
