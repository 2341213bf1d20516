//! Tender lifecycle. The `tenders` row carries ownership and status; every
//! content edit appends a `tender_versions` row and advances the head's
//! `version` pointer, so history is never rewritten.

use chrono::{DateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::domain::{ServiceType, TenderStatus, Transition};
use crate::models::{NewTender, NewTenderVersion, Tender, TenderVersion};
use crate::schema::{organization, organization_responsible, tender_versions, tenders};

use super::{
    access, non_empty, stored, utc, version_conflict, Pagination, WorkflowError, WorkflowResult,
};

const NAME_MAX_LEN: usize = 100;

/// Selects every tender joined with its current content row.
macro_rules! current_tender_rows {
    () => {
        tenders::table
            .inner_join(
                tender_versions::table.on(tender_versions::tender_id
                    .eq(tenders::id)
                    .and(tender_versions::version.eq(tenders::version))),
            )
            .select((tenders::all_columns, tender_versions::all_columns))
    };
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub status: TenderStatus,
    pub organization_id: Uuid,
    pub creator_username: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl TenderView {
    /// Combines the head with one content row. For historical rows the
    /// status is still the tender's present status.
    fn from_rows(head: Tender, content: TenderVersion) -> WorkflowResult<Self> {
        Ok(Self {
            id: head.id,
            name: content.name,
            description: content.description,
            service_type: stored(&content.service_type)?,
            status: stored(&head.status)?,
            organization_id: head.organization_id,
            creator_username: head.creator_username,
            version: content.version,
            created_at: utc(head.created_at),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewTenderInput {
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub organization_id: Uuid,
}

/// Partial update; `None` and blank strings keep the current value.
#[derive(Debug, Clone, Default)]
pub struct TenderChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub service_type: Option<ServiceType>,
}

pub fn create_tender(
    conn: &mut PgConnection,
    caller: &Caller,
    input: NewTenderInput,
) -> WorkflowResult<TenderView> {
    let name = validate_name(&input.name)?;
    let description = input.description.trim();
    if description.is_empty() {
        return Err(WorkflowError::invalid("description must not be empty"));
    }

    let organization_exists: bool = diesel::select(diesel::dsl::exists(
        organization::table.find(input.organization_id),
    ))
    .get_result(conn)?;
    if !organization_exists {
        return Err(WorkflowError::NotFound("organization"));
    }

    access::require(
        access::responsible_for_organization(conn, caller, input.organization_id)?,
        caller,
        "create tender",
    )?;
    // Responsibility implies an employee caller.
    let creator = caller.employee().ok_or(WorkflowError::Forbidden)?;

    let tender_id = Uuid::new_v4();
    conn.transaction::<_, WorkflowError, _>(|conn| {
        diesel::insert_into(tenders::table)
            .values(&NewTender {
                id: tender_id,
                organization_id: input.organization_id,
                creator_username: creator.username.clone(),
                status: TenderStatus::Created.as_str().to_string(),
                version: 1,
            })
            .execute(conn)?;

        diesel::insert_into(tender_versions::table)
            .values(&NewTenderVersion {
                tender_id,
                version: 1,
                name: name.to_string(),
                description: description.to_string(),
                service_type: input.service_type.as_str().to_string(),
            })
            .execute(conn)?;
        Ok(())
    })?;

    info!(
        %tender_id,
        organization_id = %input.organization_id,
        creator = %creator.username,
        "tender created"
    );
    current_view(conn, tender_id)
}

/// Current version unless `version` asks for a historical one.
pub fn get_tender(
    conn: &mut PgConnection,
    tender_id: Uuid,
    version: Option<i32>,
) -> WorkflowResult<TenderView> {
    let Some(version) = version else {
        return current_view(conn, tender_id);
    };

    let head = load_head(conn, tender_id)?;
    let content: TenderVersion = tender_versions::table
        .find((tender_id, version))
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("tender version"))?;
    TenderView::from_rows(head, content)
}

/// Anonymous callers may read the status; a named caller must be
/// responsible for the tender.
pub fn tender_status(
    conn: &mut PgConnection,
    caller: Option<&Caller>,
    tender_id: Uuid,
) -> WorkflowResult<TenderStatus> {
    let head = load_head(conn, tender_id)?;
    if let Some(caller) = caller {
        access::require(
            access::responsible_for_tender(conn, caller, &head)?,
            caller,
            "view tender status",
        )?;
    }
    stored(&head.status)
}

pub fn set_tender_status(
    conn: &mut PgConnection,
    caller: &Caller,
    tender_id: Uuid,
    next: TenderStatus,
) -> WorkflowResult<TenderView> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let head = lock_head(conn, tender_id)?;
        access::require(
            access::responsible_for_tender(conn, caller, &head)?,
            caller,
            "set tender status",
        )?;

        let current: TenderStatus = stored(&head.status)?;
        match current.transition_to(next) {
            Transition::Unchanged => {}
            Transition::Allowed => {
                diesel::update(tenders::table.find(tender_id))
                    .set((
                        tenders::status.eq(next.as_str()),
                        tenders::updated_at.eq(Utc::now().naive_utc()),
                    ))
                    .execute(conn)?;
                info!(%tender_id, from = %current, to = %next, "tender status changed");
            }
            Transition::Rejected => {
                warn!(%tender_id, from = %current, to = %next, "rejected tender status change");
                return Err(WorkflowError::conflict(format!(
                    "tender cannot move from {current} to {next}"
                )));
            }
        }

        current_view(conn, tender_id)
    })
}

pub fn edit_tender(
    conn: &mut PgConnection,
    caller: &Caller,
    tender_id: Uuid,
    changes: TenderChanges,
) -> WorkflowResult<TenderView> {
    let name = match non_empty(changes.name.as_deref()) {
        Some(name) => Some(validate_name(name)?),
        None => None,
    };

    conn.transaction::<_, WorkflowError, _>(|conn| {
        let head = lock_head(conn, tender_id)?;
        access::require(
            access::responsible_for_tender(conn, caller, &head)?,
            caller,
            "edit tender",
        )?;

        let current = current_content(conn, &head)?;
        let next = NewTenderVersion {
            tender_id,
            version: head.version + 1,
            name: name.map(str::to_string).unwrap_or(current.name),
            description: non_empty(changes.description.as_deref())
                .map(str::to_string)
                .unwrap_or(current.description),
            service_type: changes
                .service_type
                .map(|service_type| service_type.as_str().to_string())
                .unwrap_or(current.service_type),
        };
        append_version(conn, &head, next)?;

        info!(%tender_id, version = head.version + 1, "tender edited");
        current_view(conn, tender_id)
    })
}

/// Appends a new version whose content copies `version`. Status stays as is.
pub fn rollback_tender(
    conn: &mut PgConnection,
    caller: &Caller,
    tender_id: Uuid,
    version: i32,
) -> WorkflowResult<TenderView> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let head = lock_head(conn, tender_id)?;
        access::require(
            access::responsible_for_tender(conn, caller, &head)?,
            caller,
            "rollback tender",
        )?;

        let target: TenderVersion = tender_versions::table
            .find((tender_id, version))
            .first(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("tender version"))?;

        append_version(
            conn,
            &head,
            NewTenderVersion {
                tender_id,
                version: head.version + 1,
                name: target.name,
                description: target.description,
                service_type: target.service_type,
            },
        )?;

        info!(
            %tender_id,
            restored_from = version,
            version = head.version + 1,
            "tender rolled back"
        );
        current_view(conn, tender_id)
    })
}

/// Every version of a tender, oldest first.
pub fn list_tender_versions(
    conn: &mut PgConnection,
    caller: &Caller,
    tender_id: Uuid,
) -> WorkflowResult<Vec<TenderView>> {
    let head = load_head(conn, tender_id)?;
    access::require(
        access::responsible_for_tender(conn, caller, &head)?,
        caller,
        "view tender history",
    )?;

    let versions: Vec<TenderVersion> = tender_versions::table
        .filter(tender_versions::tender_id.eq(tender_id))
        .order(tender_versions::version.asc())
        .load(conn)?;

    versions
        .into_iter()
        .map(|content| TenderView::from_rows(head.clone(), content))
        .collect()
}

/// Hard delete. Versions, bids and reviews go with it through the
/// foreign-key cascades.
pub fn delete_tender(
    conn: &mut PgConnection,
    caller: &Caller,
    tender_id: Uuid,
) -> WorkflowResult<()> {
    let head = load_head(conn, tender_id)?;
    access::require(
        access::responsible_for_tender(conn, caller, &head)?,
        caller,
        "delete tender",
    )?;

    let deleted = diesel::delete(tenders::table.find(tender_id)).execute(conn)?;
    if deleted == 0 {
        return Err(WorkflowError::NotFound("tender"));
    }
    info!(%tender_id, "tender deleted");
    Ok(())
}

/// Newest tenders first, optionally restricted to any of `service_types`.
pub fn list_tenders(
    conn: &mut PgConnection,
    service_types: &[ServiceType],
    page: Pagination,
) -> WorkflowResult<Vec<TenderView>> {
    let mut query = current_tender_rows!().into_boxed();
    if !service_types.is_empty() {
        let wanted: Vec<&str> = service_types.iter().map(|value| value.as_str()).collect();
        query = query.filter(tender_versions::service_type.eq_any(wanted));
    }

    let rows: Vec<(Tender, TenderVersion)> = query
        .order((tenders::created_at.desc(), tenders::id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .load(conn)?;

    into_views(rows)
}

/// Tenders of every organization the caller is responsible for, by name.
pub fn list_tenders_for_employee(
    conn: &mut PgConnection,
    caller: &Caller,
    page: Pagination,
) -> WorkflowResult<Vec<TenderView>> {
    let Some(employee) = caller.employee() else {
        return Err(WorkflowError::Forbidden);
    };

    let rows: Vec<(Tender, TenderVersion)> = current_tender_rows!()
        .filter(
            tenders::organization_id.eq_any(
                organization_responsible::table
                    .filter(organization_responsible::user_id.eq(employee.id))
                    .select(organization_responsible::organization_id),
            ),
        )
        .order((tender_versions::name.asc(), tenders::id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .load(conn)?;

    into_views(rows)
}

pub(crate) fn load_head(conn: &mut PgConnection, tender_id: Uuid) -> WorkflowResult<Tender> {
    tenders::table
        .find(tender_id)
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("tender"))
}

/// Row lock held until the surrounding transaction ends, serializing
/// writers of the same tender.
fn lock_head(conn: &mut PgConnection, tender_id: Uuid) -> WorkflowResult<Tender> {
    tenders::table
        .find(tender_id)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("tender"))
}

fn current_content(conn: &mut PgConnection, head: &Tender) -> WorkflowResult<TenderVersion> {
    tender_versions::table
        .find((head.id, head.version))
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            WorkflowError::Internal(format!("tender {} has no version {}", head.id, head.version))
        })
}

/// Inserts `next` and moves the head pointer with a compare-and-swap on the
/// version the caller read.
fn append_version(
    conn: &mut PgConnection,
    head: &Tender,
    next: NewTenderVersion,
) -> WorkflowResult<()> {
    let next_version = next.version;
    diesel::insert_into(tender_versions::table)
        .values(&next)
        .execute(conn)
        .map_err(version_conflict)?;

    let moved = diesel::update(
        tenders::table
            .find(head.id)
            .filter(tenders::version.eq(head.version)),
    )
    .set((
        tenders::version.eq(next_version),
        tenders::updated_at.eq(Utc::now().naive_utc()),
    ))
    .execute(conn)?;

    if moved == 0 {
        return Err(WorkflowError::conflict(
            "tender was modified concurrently, retry the request",
        ));
    }
    Ok(())
}

fn current_view(conn: &mut PgConnection, tender_id: Uuid) -> WorkflowResult<TenderView> {
    let (head, content): (Tender, TenderVersion) = current_tender_rows!()
        .filter(tenders::id.eq(tender_id))
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("tender"))?;
    TenderView::from_rows(head, content)
}

fn into_views(rows: Vec<(Tender, TenderVersion)>) -> WorkflowResult<Vec<TenderView>> {
    rows.into_iter()
        .map(|(head, content)| TenderView::from_rows(head, content))
        .collect()
}

fn validate_name(raw: &str) -> WorkflowResult<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(WorkflowError::invalid("name must not be empty"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(WorkflowError::invalid(format!(
            "name must be at most {NAME_MAX_LEN} characters"
        )));
    }
    Ok(name)
}
