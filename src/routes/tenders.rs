use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::{Query as MultiQuery, WithRejection};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{ClaimedIdentity, IdentityClaim};
use crate::domain::{ServiceType, TenderStatus};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::workflow::{
    requested,
    tenders::{self, NewTenderInput, TenderChanges, TenderView},
};

use super::{required_param, PageParams};

#[derive(Deserialize)]
pub struct ListTendersQuery {
    #[serde(default, rename = "serviceType")]
    service_type: Vec<String>,
    limit: Option<String>,
    offset: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenderRequest {
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub organization_id: Uuid,
    pub creator_username: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EditTenderRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub service_type: Option<String>,
}

#[derive(Deserialize)]
pub struct VersionQuery {
    version: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    status: Option<String>,
}

pub async fn list_tenders(
    State(state): State<AppState>,
    MultiQuery(params): MultiQuery<ListTendersQuery>,
) -> AppResult<Json<Vec<TenderView>>> {
    let page = PageParams {
        limit: params.limit,
        offset: params.offset,
    }
    .pagination()?;
    let service_types = params
        .service_type
        .iter()
        .map(|raw| requested::<ServiceType>(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut conn = state.db()?;
    Ok(Json(tenders::list_tenders(&mut conn, &service_types, page)?))
}

pub async fn my_tenders(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    Query(page): Query<PageParams>,
) -> AppResult<Json<Vec<TenderView>>> {
    let page = page.pagination()?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(tenders::list_tenders_for_employee(
        &mut conn, &caller, page,
    )?))
}

pub async fn create_tender(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Json(payload), _): WithRejection<Json<CreateTenderRequest>, AppError>,
) -> AppResult<(StatusCode, Json<TenderView>)> {
    let service_type: ServiceType = requested(&payload.service_type)?;
    let claim = match payload
        .creator_username
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(username) => IdentityClaim::username(username),
        None => claim,
    };

    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    let tender = tenders::create_tender(
        &mut conn,
        &caller,
        NewTenderInput {
            name: payload.name,
            description: payload.description,
            service_type,
            organization_id: payload.organization_id,
        },
    )?;
    Ok((StatusCode::CREATED, Json(tender)))
}

pub async fn get_tender(
    State(state): State<AppState>,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
    Query(query): Query<VersionQuery>,
) -> AppResult<Json<TenderView>> {
    let version = match query.version.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            raw.parse::<i32>()
                .ok()
                .filter(|value| *value >= 1)
                .ok_or_else(|| AppError::bad_request("version must be a positive integer"))?,
        ),
        _ => None,
    };

    let mut conn = state.db()?;
    Ok(Json(tenders::get_tender(&mut conn, tender_id, version)?))
}

pub async fn delete_tender(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    tenders::delete_tender(&mut conn, &caller, tender_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_tender_status(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<TenderStatus>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve_optional(&mut conn, &claim)?;
    Ok(Json(tenders::tender_status(
        &mut conn,
        caller.as_ref(),
        tender_id,
    )?))
}

pub async fn set_tender_status(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<TenderView>> {
    let next: TenderStatus = requested(required_param("status", query.status.as_deref())?)?;
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(tenders::set_tender_status(
        &mut conn, &caller, tender_id, next,
    )?))
}

pub async fn edit_tender(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<EditTenderRequest>, AppError>,
) -> AppResult<Json<TenderView>> {
    let service_type = match payload
        .service_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(raw) => Some(requested::<ServiceType>(raw)?),
        None => None,
    };

    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    let tender = tenders::edit_tender(
        &mut conn,
        &caller,
        tender_id,
        TenderChanges {
            name: payload.name,
            description: payload.description,
            service_type,
        },
    )?;
    Ok(Json(tender))
}

pub async fn rollback_tender(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path((tender_id, version)), _): WithRejection<Path<(Uuid, i32)>, AppError>,
) -> AppResult<Json<TenderView>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(tenders::rollback_tender(
        &mut conn, &caller, tender_id, version,
    )?))
}

pub async fn tender_history(
    State(state): State<AppState>,
    ClaimedIdentity(claim): ClaimedIdentity,
    WithRejection(Path(tender_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Vec<TenderView>>> {
    let mut conn = state.db()?;
    let caller = state.identity.resolve(&mut conn, &claim)?;
    Ok(Json(tenders::list_tender_versions(
        &mut conn, &caller, tender_id,
    )?))
}
