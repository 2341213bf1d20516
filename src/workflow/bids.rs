//! Bid lifecycle, decisions, feedback and reviews. Bids use the same
//! append-only versioning as tenders: `bids` is the head, `bid_versions`
//! holds one content row per version.

use chrono::{DateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::domain::{AuthorType, BidStatus, Decision, Transition};
use crate::models::{Bid, BidReview, BidVersion, NewBid, NewBidReview, NewBidVersion};
use crate::schema::{bid_reviews, bid_versions, bids, employee};

use super::{
    access, non_empty, stored, tenders, utc, version_conflict, Pagination, WorkflowError,
    WorkflowResult,
};

const NAME_MAX_LEN: usize = 100;

macro_rules! current_bid_rows {
    () => {
        bids::table
            .inner_join(
                bid_versions::table.on(bid_versions::bid_id
                    .eq(bids::id)
                    .and(bid_versions::version.eq(bids::version))),
            )
            .select((bids::all_columns, bid_versions::all_columns))
    };
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: BidStatus,
    pub tender_id: Uuid,
    pub author_type: AuthorType,
    pub author_id: Uuid,
    pub version: i32,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

impl BidView {
    fn from_rows(head: Bid, content: BidVersion) -> WorkflowResult<Self> {
        Ok(Self {
            id: head.id,
            name: content.name,
            description: content.description,
            status: stored(&head.status)?,
            tender_id: head.tender_id,
            author_type: stored(&head.author_type)?,
            author_id: head.author_id,
            version: content.version,
            feedback: head.feedback,
            created_at: utc(head.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub review: String,
    pub created_at: DateTime<Utc>,
}

impl From<BidReview> for ReviewView {
    fn from(row: BidReview) -> Self {
        Self {
            id: row.id,
            bid_id: row.bid_id,
            review: row.review,
            created_at: utc(row.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBidInput {
    pub name: String,
    pub description: String,
    pub tender_id: Uuid,
    pub author_type: AuthorType,
    pub author_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct BidChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn create_bid(
    conn: &mut PgConnection,
    caller: &Caller,
    input: NewBidInput,
) -> WorkflowResult<BidView> {
    let name = validate_name(&input.name)?;
    let description = input.description.trim();
    if description.is_empty() {
        return Err(WorkflowError::invalid("description must not be empty"));
    }

    // Existence first: a bid on a missing tender is NotFound and inserts nothing.
    tenders::load_head(conn, input.tender_id)?;

    let acting_as_author =
        caller.author_type() == input.author_type && caller.id() == input.author_id;
    access::require(acting_as_author, caller, "create bid")?;

    let bid_id = Uuid::new_v4();
    conn.transaction::<_, WorkflowError, _>(|conn| {
        diesel::insert_into(bids::table)
            .values(&NewBid {
                id: bid_id,
                tender_id: input.tender_id,
                author_type: input.author_type.as_str().to_string(),
                author_id: input.author_id,
                status: BidStatus::Created.as_str().to_string(),
                version: 1,
            })
            .execute(conn)?;

        diesel::insert_into(bid_versions::table)
            .values(&NewBidVersion {
                bid_id,
                version: 1,
                name: name.to_string(),
                description: description.to_string(),
            })
            .execute(conn)?;
        Ok(())
    })?;

    info!(
        %bid_id,
        tender_id = %input.tender_id,
        author_type = %input.author_type,
        author_id = %input.author_id,
        "bid created"
    );
    current_view(conn, bid_id)
}

pub fn get_bid(conn: &mut PgConnection, caller: &Caller, bid_id: Uuid) -> WorkflowResult<BidView> {
    let head = load_head(conn, bid_id)?;
    access::require(
        access::authorized_for_bid_view(conn, caller, &head)?,
        caller,
        "view bid",
    )?;
    current_view(conn, bid_id)
}

pub fn bid_status(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
) -> WorkflowResult<BidStatus> {
    let head = load_head(conn, bid_id)?;
    access::require(
        access::authorized_for_bid_view(conn, caller, &head)?,
        caller,
        "view bid status",
    )?;
    stored(&head.status)
}

/// Generic status change. Only cancellation is accepted here; publication
/// goes through [`submit_decision`].
pub fn set_bid_status(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
    next: BidStatus,
) -> WorkflowResult<BidView> {
    if !next.settable_directly() {
        return Err(WorkflowError::invalid(format!(
            "bid status cannot be set to {next} directly"
        )));
    }
    transition(conn, caller, bid_id, next, "set bid status")
}

pub fn submit_decision(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
    decision: Decision,
) -> WorkflowResult<BidView> {
    let view = transition(
        conn,
        caller,
        bid_id,
        decision.target_status(),
        "submit bid decision",
    )?;
    info!(%bid_id, %decision, "bid decision recorded");
    Ok(view)
}

/// Overwrites the feedback; earlier feedback is not kept.
pub fn submit_feedback(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
    feedback: &str,
) -> WorkflowResult<BidView> {
    let feedback = feedback.trim();
    if feedback.is_empty() {
        return Err(WorkflowError::invalid("bidFeedback must not be empty"));
    }

    conn.transaction::<_, WorkflowError, _>(|conn| {
        let head = lock_head(conn, bid_id)?;
        access::require(
            access::responsible_for_bid(conn, caller, &head)?,
            caller,
            "submit bid feedback",
        )?;

        diesel::update(bids::table.find(bid_id))
            .set((
                bids::feedback.eq(feedback),
                bids::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        info!(%bid_id, "bid feedback submitted");
        current_view(conn, bid_id)
    })
}

pub fn edit_bid(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
    changes: BidChanges,
) -> WorkflowResult<BidView> {
    let name = match non_empty(changes.name.as_deref()) {
        Some(name) => Some(validate_name(name)?),
        None => None,
    };

    conn.transaction::<_, WorkflowError, _>(|conn| {
        let head = lock_head(conn, bid_id)?;
        access::require(
            access::responsible_for_bid(conn, caller, &head)?,
            caller,
            "edit bid",
        )?;

        let current = current_content(conn, &head)?;
        append_version(
            conn,
            &head,
            NewBidVersion {
                bid_id,
                version: head.version + 1,
                name: name.map(str::to_string).unwrap_or(current.name),
                description: non_empty(changes.description.as_deref())
                    .map(str::to_string)
                    .unwrap_or(current.description),
            },
        )?;

        info!(%bid_id, version = head.version + 1, "bid edited");
        current_view(conn, bid_id)
    })
}

/// Appends a new version copying the content of `version`. Status and
/// feedback are left untouched.
pub fn rollback_bid(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
    version: i32,
) -> WorkflowResult<BidView> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let head = lock_head(conn, bid_id)?;
        access::require(
            access::responsible_for_bid(conn, caller, &head)?,
            caller,
            "rollback bid",
        )?;

        let target: BidVersion = bid_versions::table
            .find((bid_id, version))
            .first(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("bid version"))?;

        append_version(
            conn,
            &head,
            NewBidVersion {
                bid_id,
                version: head.version + 1,
                name: target.name,
                description: target.description,
            },
        )?;

        info!(
            %bid_id,
            restored_from = version,
            version = head.version + 1,
            "bid rolled back"
        );
        current_view(conn, bid_id)
    })
}

pub fn list_bid_versions(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
) -> WorkflowResult<Vec<BidView>> {
    let head = load_head(conn, bid_id)?;
    access::require(
        access::responsible_for_bid(conn, caller, &head)?,
        caller,
        "view bid history",
    )?;

    let versions: Vec<BidVersion> = bid_versions::table
        .filter(bid_versions::bid_id.eq(bid_id))
        .order(bid_versions::version.asc())
        .load(conn)?;

    versions
        .into_iter()
        .map(|content| BidView::from_rows(head.clone(), content))
        .collect()
}

pub fn delete_bid(conn: &mut PgConnection, caller: &Caller, bid_id: Uuid) -> WorkflowResult<()> {
    let head = load_head(conn, bid_id)?;
    access::require(
        access::responsible_for_bid(conn, caller, &head)?,
        caller,
        "delete bid",
    )?;

    let deleted = diesel::delete(bids::table.find(bid_id)).execute(conn)?;
    if deleted == 0 {
        return Err(WorkflowError::NotFound("bid"));
    }
    info!(%bid_id, "bid deleted");
    Ok(())
}

pub fn add_review(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
    review: &str,
) -> WorkflowResult<ReviewView> {
    let review = review.trim();
    if review.is_empty() {
        return Err(WorkflowError::invalid("review must not be empty"));
    }

    let head = load_head(conn, bid_id)?;
    access::require(
        access::responsible_for_bid(conn, caller, &head)?,
        caller,
        "add bid review",
    )?;

    let review_id = Uuid::new_v4();
    diesel::insert_into(bid_reviews::table)
        .values(&NewBidReview {
            id: review_id,
            bid_id,
            review: review.to_string(),
        })
        .execute(conn)?;

    let stored_review: BidReview = bid_reviews::table.find(review_id).first(conn)?;
    info!(%bid_id, %review_id, "bid review added");
    Ok(stored_review.into())
}

/// Reviews on bids that `author_username` submitted to the tender. Access
/// comes from responsibility for the tender, not from owning the reviews.
pub fn list_reviews(
    conn: &mut PgConnection,
    caller: &Caller,
    tender_id: Uuid,
    author_username: &str,
    page: Pagination,
) -> WorkflowResult<Vec<ReviewView>> {
    let author_username = author_username.trim();
    if author_username.is_empty() {
        return Err(WorkflowError::invalid("authorUsername must not be empty"));
    }

    let tender = tenders::load_head(conn, tender_id)?;
    access::require(
        access::responsible_for_tender(conn, caller, &tender)?,
        caller,
        "view bid reviews",
    )?;

    let authored_bids = bids::table
        .inner_join(employee::table.on(employee::id.eq(bids::author_id)))
        .filter(bids::tender_id.eq(tender_id))
        .filter(bids::author_type.eq(AuthorType::User.as_str()))
        .filter(employee::username.eq(author_username))
        .select(bids::id);

    let rows: Vec<BidReview> = bid_reviews::table
        .filter(bid_reviews::bid_id.eq_any(authored_bids))
        .order((bid_reviews::created_at.desc(), bid_reviews::id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .load(conn)?;

    Ok(rows.into_iter().map(ReviewView::from).collect())
}

/// Bids the caller authored, by name.
pub fn list_bids_for_caller(
    conn: &mut PgConnection,
    caller: &Caller,
    page: Pagination,
) -> WorkflowResult<Vec<BidView>> {
    let rows: Vec<(Bid, BidVersion)> = current_bid_rows!()
        .filter(bids::author_type.eq(caller.author_type().as_str()))
        .filter(bids::author_id.eq(caller.id()))
        .order((bid_versions::name.asc(), bids::id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .load(conn)?;

    into_views(rows)
}

pub fn list_bids_for_tender(
    conn: &mut PgConnection,
    caller: &Caller,
    tender_id: Uuid,
    page: Pagination,
) -> WorkflowResult<Vec<BidView>> {
    let tender = tenders::load_head(conn, tender_id)?;
    access::require(
        access::responsible_for_tender(conn, caller, &tender)?,
        caller,
        "list tender bids",
    )?;

    let rows: Vec<(Bid, BidVersion)> = current_bid_rows!()
        .filter(bids::tender_id.eq(tender_id))
        .order((bid_versions::name.asc(), bids::id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .load(conn)?;

    into_views(rows)
}

/// Administrative listing; performs no access check.
pub fn list_all_bids(conn: &mut PgConnection, page: Pagination) -> WorkflowResult<Vec<BidView>> {
    let rows: Vec<(Bid, BidVersion)> = current_bid_rows!()
        .order((bids::created_at.desc(), bids::id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .load(conn)?;

    into_views(rows)
}

fn transition(
    conn: &mut PgConnection,
    caller: &Caller,
    bid_id: Uuid,
    next: BidStatus,
    action: &'static str,
) -> WorkflowResult<BidView> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let head = lock_head(conn, bid_id)?;
        access::require(
            access::responsible_for_bid(conn, caller, &head)?,
            caller,
            action,
        )?;

        let current: BidStatus = stored(&head.status)?;
        match current.transition_to(next) {
            Transition::Unchanged => {}
            Transition::Allowed => {
                diesel::update(bids::table.find(bid_id))
                    .set((
                        bids::status.eq(next.as_str()),
                        bids::updated_at.eq(Utc::now().naive_utc()),
                    ))
                    .execute(conn)?;
                info!(%bid_id, from = %current, to = %next, "bid status changed");
            }
            Transition::Rejected => {
                warn!(%bid_id, from = %current, to = %next, "rejected bid status change");
                return Err(WorkflowError::conflict(format!(
                    "bid cannot move from {current} to {next}"
                )));
            }
        }

        current_view(conn, bid_id)
    })
}

fn load_head(conn: &mut PgConnection, bid_id: Uuid) -> WorkflowResult<Bid> {
    bids::table
        .find(bid_id)
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("bid"))
}

fn lock_head(conn: &mut PgConnection, bid_id: Uuid) -> WorkflowResult<Bid> {
    bids::table
        .find(bid_id)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("bid"))
}

fn current_content(conn: &mut PgConnection, head: &Bid) -> WorkflowResult<BidVersion> {
    bid_versions::table
        .find((head.id, head.version))
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            WorkflowError::Internal(format!("bid {} has no version {}", head.id, head.version))
        })
}

fn append_version(conn: &mut PgConnection, head: &Bid, next: NewBidVersion) -> WorkflowResult<()> {
    let next_version = next.version;
    diesel::insert_into(bid_versions::table)
        .values(&next)
        .execute(conn)
        .map_err(version_conflict)?;

    let moved = diesel::update(bids::table.find(head.id).filter(bids::version.eq(head.version)))
        .set((
            bids::version.eq(next_version),
            bids::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    if moved == 0 {
        return Err(WorkflowError::conflict(
            "bid was modified concurrently, retry the request",
        ));
    }
    Ok(())
}

fn current_view(conn: &mut PgConnection, bid_id: Uuid) -> WorkflowResult<BidView> {
    let (head, content): (Bid, BidVersion) = current_bid_rows!()
        .filter(bids::id.eq(bid_id))
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("bid"))?;
    BidView::from_rows(head, content)
}

fn into_views(rows: Vec<(Bid, BidVersion)>) -> WorkflowResult<Vec<BidView>> {
    rows.into_iter()
        .map(|(head, content)| BidView::from_rows(head, content))
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
