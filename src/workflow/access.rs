//! Authorization predicates. Each one is a read-only lookup; callers turn a
//! `false` into [`WorkflowError::Forbidden`] through [`require`].

use diesel::{dsl::exists, prelude::*, PgConnection};
use tracing::warn;
use uuid::Uuid;

use crate::auth::Caller;
use crate::domain::AuthorType;
use crate::models::{Bid, Tender};
use crate::schema::organization_responsible;

use super::{stored, WorkflowError, WorkflowResult};

pub fn is_responsible_for_organization(
    conn: &mut PgConnection,
    employee_id: Uuid,
    organization_id: Uuid,
) -> WorkflowResult<bool> {
    let responsible = diesel::select(exists(
        organization_responsible::table
            .filter(organization_responsible::user_id.eq(employee_id))
            .filter(organization_responsible::organization_id.eq(organization_id)),
    ))
    .get_result(conn)?;
    Ok(responsible)
}

/// Only employees can hold responsibility for an organization.
pub fn responsible_for_organization(
    conn: &mut PgConnection,
    caller: &Caller,
    organization_id: Uuid,
) -> WorkflowResult<bool> {
    match caller.employee() {
        Some(employee) => is_responsible_for_organization(conn, employee.id, organization_id),
        None => Ok(false),
    }
}

pub fn responsible_for_tender(
    conn: &mut PgConnection,
    caller: &Caller,
    tender: &Tender,
) -> WorkflowResult<bool> {
    responsible_for_organization(conn, caller, tender.organization_id)
}

/// True when the caller authored the bid: the employee itself for `User`
/// bids; the organization, or an employee responsible for it, for
/// `Organization` bids.
pub fn responsible_for_bid(
    conn: &mut PgConnection,
    caller: &Caller,
    bid: &Bid,
) -> WorkflowResult<bool> {
    let author_type: AuthorType = stored(&bid.author_type)?;
    match (caller, author_type) {
        (Caller::Employee(employee), AuthorType::User) => Ok(employee.id == bid.author_id),
        (Caller::Employee(employee), AuthorType::Organization) => {
            is_responsible_for_organization(conn, employee.id, bid.author_id)
        }
        (Caller::Organization(organization), AuthorType::Organization) => {
            Ok(organization.id == bid.author_id)
        }
        (Caller::Organization(_), AuthorType::User) => Ok(false),
    }
}

/// There is no separate viewer role for bids.
pub fn authorized_for_bid_view(
    conn: &mut PgConnection,
    caller: &Caller,
    bid: &Bid,
) -> WorkflowResult<bool> {
    responsible_for_bid(conn, caller, bid)
}

pub fn require(allowed: bool, caller: &Caller, action: &'static str) -> WorkflowResult<()> {
    if allowed {
        return Ok(());
    }
    warn!(caller_id = %caller.id(), action, "authorization denied");
    Err(WorkflowError::Forbidden)
}
