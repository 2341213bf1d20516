use diesel::prelude::*;
use diesel::PgConnection;
use tracing::debug;
use uuid::Uuid;

use crate::domain::AuthorType;
use crate::models::{Employee, Organization};
use crate::schema::{employee, organization};
use crate::workflow::{requested, WorkflowError, WorkflowResult};

/// Who the request says it is acting as. Nothing in a claim is verified
/// beyond the referenced employee or organization existing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaim {
    pub username: Option<String>,
    pub author: Option<AuthorClaim>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorClaim {
    pub author_id: Uuid,
    pub author_type: AuthorType,
}

impl IdentityClaim {
    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            author: None,
        }
    }

    pub fn author(author_id: Uuid, author_type: AuthorType) -> Self {
        Self {
            username: None,
            author: Some(AuthorClaim {
                author_id,
                author_type,
            }),
        }
    }

    /// Builds a claim from raw request values. The author pair only counts
    /// when both halves are present.
    pub fn from_raw(
        username: Option<&str>,
        author_id: Option<&str>,
        author_type: Option<&str>,
    ) -> WorkflowResult<Self> {
        let username = username
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let author_id = author_id.map(str::trim).filter(|value| !value.is_empty());
        let author_type = author_type.map(str::trim).filter(|value| !value.is_empty());

        let author = match (author_id, author_type) {
            (Some(id), Some(kind)) => Some(AuthorClaim {
                author_id: Uuid::parse_str(id)
                    .map_err(|_| WorkflowError::invalid("authorId must be a UUID"))?,
                author_type: requested(kind)?,
            }),
            _ => None,
        };

        Ok(Self { username, author })
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.author.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum Caller {
    Employee(Employee),
    Organization(Organization),
}

impl Caller {
    pub fn employee(&self) -> Option<&Employee> {
        match self {
            Caller::Employee(employee) => Some(employee),
            Caller::Organization(_) => None,
        }
    }

    pub fn author_type(&self) -> AuthorType {
        match self {
            Caller::Employee(_) => AuthorType::User,
            Caller::Organization(_) => AuthorType::Organization,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Caller::Employee(employee) => employee.id,
            Caller::Organization(organization) => organization.id,
        }
    }
}

/// Turns a claim into a caller. Swapping this out is how a verifying
/// implementation would replace trust-on-claim.
pub trait IdentityResolver: Send + Sync + 'static {
    fn resolve(&self, conn: &mut PgConnection, claim: &IdentityClaim) -> WorkflowResult<Caller>;

    /// Like `resolve`, but an empty claim is an anonymous caller instead of
    /// an error.
    fn resolve_optional(
        &self,
        conn: &mut PgConnection,
        claim: &IdentityClaim,
    ) -> WorkflowResult<Option<Caller>> {
        if claim.is_empty() {
            return Ok(None);
        }
        self.resolve(conn, claim).map(Some)
    }
}

/// Accepts whatever identity the request names, provided it exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClaimedIdentityResolver;

impl IdentityResolver for ClaimedIdentityResolver {
    fn resolve(&self, conn: &mut PgConnection, claim: &IdentityClaim) -> WorkflowResult<Caller> {
        if let Some(username) = claim.username.as_deref() {
            let found: Option<Employee> = employee::table
                .filter(employee::username.eq(username))
                .first(conn)
                .optional()?;
            debug!(%username, found = found.is_some(), "resolved claimed username");
            return found
                .map(Caller::Employee)
                .ok_or(WorkflowError::Unauthenticated);
        }

        match claim.author {
            Some(AuthorClaim {
                author_id,
                author_type: AuthorType::User,
            }) => {
                let found: Option<Employee> =
                    employee::table.find(author_id).first(conn).optional()?;
                debug!(%author_id, found = found.is_some(), "resolved claimed employee");
                found
                    .map(Caller::Employee)
                    .ok_or(WorkflowError::NotFound("employee"))
            }
            Some(AuthorClaim {
                author_id,
                author_type: AuthorType::Organization,
            }) => {
                let found: Option<Organization> =
                    organization::table.find(author_id).first(conn).optional()?;
                debug!(%author_id, found = found.is_some(), "resolved claimed organization");
                found
                    .map(Caller::Organization)
                    .ok_or(WorkflowError::NotFound("organization"))
            }
            None => Err(WorkflowError::Unauthenticated),
        }
    }
}
