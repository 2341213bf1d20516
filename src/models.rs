use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = employee)]
pub struct Employee {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = employee)]
pub struct NewEmployee {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = organization)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub organization_type: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = organization)]
pub struct NewOrganization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub organization_type: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = organization_responsible)]
pub struct NewOrganizationResponsible {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
}

/// Non-versioned part of a tender. `version` points at the current row in
/// `tender_versions`.
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tenders)]
pub struct Tender {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub creator_username: String,
    pub status: String,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tenders)]
pub struct NewTender {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub creator_username: String,
    pub status: String,
    pub version: i32,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = tender_versions)]
#[diesel(belongs_to(Tender))]
#[diesel(primary_key(tender_id, version))]
pub struct TenderVersion {
    pub tender_id: Uuid,
    pub version: i32,
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tender_versions)]
pub struct NewTenderVersion {
    pub tender_id: Uuid,
    pub version: i32,
    pub name: String,
    pub description: String,
    pub service_type: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = bids)]
#[diesel(belongs_to(Tender))]
pub struct Bid {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub author_type: String,
    pub author_id: Uuid,
    pub status: String,
    pub version: i32,
    pub feedback: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bids)]
pub struct NewBid {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub author_type: String,
    pub author_id: Uuid,
    pub status: String,
    pub version: i32,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = bid_versions)]
#[diesel(belongs_to(Bid))]
#[diesel(primary_key(bid_id, version))]
pub struct BidVersion {
    pub bid_id: Uuid,
    pub version: i32,
    pub name: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bid_versions)]
pub struct NewBidVersion {
    pub bid_id: Uuid,
    pub version: i32,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = bid_reviews)]
#[diesel(belongs_to(Bid))]
pub struct BidReview {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub review: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bid_reviews)]
pub struct NewBidReview {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub review: String,
}
