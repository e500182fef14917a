use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Database-backed rows ---

/// User
///
/// Represents the user's canonical identity record stored in the `users` table.
/// The password hash never leaves the server: it is skipped on serialization so
/// no response or log line can leak it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    // The user's primary identifier, unique across the table.
    pub email: String,
    // Salted one-way hash of the login password.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    // The RBAC flag: admins may delete records and manage users.
    pub is_admin: bool,
}

/// Hoarding
///
/// Represents one physical advertising hoarding (billboard) from the `hoardings`
/// table. This is the primary data structure for the core business logic.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default, PartialEq)]
pub struct Hoarding {
    pub id: Uuid,
    // Physical dimensions, free text (e.g. "20x10 ft").
    pub size: String,
    pub place: String,
    pub owner_name: String,
    pub contact: String,
    pub address: String,
    // Google Maps link to the physical site.
    pub location_url: String,
    // Showroom association is optional; records without one never appear in
    // the per-showroom aggregation.
    pub showroom_name: Option<String>,
    pub showroom_location: Option<String>,
    // When the lease/contract must be renewed. Drives dashboard ordering.
    pub renewal_date: NaiveDate,
    // Rental amount per term.
    pub amount: f64,
    // Name of the uploaded image under the upload directory, if any.
    pub image_filename: Option<String>,
    // FK to users.id (owner for authorization purposes).
    pub created_by: Uuid,
}

// --- Query Types ---

/// MatchMode
///
/// How the list filters compare a criterion against the stored value. The
/// dashboard defaults to the friendlier substring mode; exact equality stays
/// available for callers that need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive substring containment.
    #[default]
    Contains,
    /// Exact equality on the stored value.
    Exact,
}

/// HoardingFilter
///
/// Optional narrowing criteria for list queries. `showroom` matches against
/// `showroom_name` and `location` against `showroom_location`; empty strings
/// are treated as absent by the boundary layer before this struct is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoardingFilter {
    pub place: Option<String>,
    pub showroom: Option<String>,
    pub location: Option<String>,
    pub mode: MatchMode,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials submitted by the login form (POST /login).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Input payload for the admin user-provisioning form (POST /admin/users).
/// The admin flag arrives checkbox-style: present when ticked, absent when not.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub is_admin: Option<String>,
}

impl CreateUserRequest {
    /// Checkbox semantics: any submitted value means "make this user an admin".
    pub fn admin_flag(&self) -> bool {
        self.is_admin.is_some()
    }
}

/// HoardingForm
///
/// Raw text fields collected from the add/edit multipart form, before any
/// validation. Every field is optional here; the lifecycle service decides
/// which ones are actually required.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct HoardingForm {
    pub size: Option<String>,
    pub place: Option<String>,
    pub owner_name: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
    pub location_url: Option<String>,
    pub showroom_name: Option<String>,
    pub showroom_location: Option<String>,
    pub renewal_date: Option<String>,
    pub amount: Option<String>,
}

/// HoardingFields
///
/// The validated, typed counterpart of [`HoardingForm`]. Constructing one of
/// these is the only way form data reaches the repository, so every persisted
/// field is visible right here rather than copied over dynamically.
#[derive(Debug, Clone, PartialEq)]
pub struct HoardingFields {
    pub size: String,
    pub place: String,
    pub owner_name: String,
    pub contact: String,
    pub address: String,
    pub location_url: String,
    pub showroom_name: Option<String>,
    pub showroom_location: Option<String>,
    pub renewal_date: NaiveDate,
    pub amount: f64,
}

/// ImageUpload
///
/// An uploaded file captured from a multipart part, held in memory until the
/// image store accepts or rejects it.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// The client-supplied filename, used to derive the file extension.
    pub filename: String,
    pub bytes: Vec<u8>,
}

// --- Dashboard Schemas (Output) ---

/// DashboardData
///
/// Everything the dashboard view renders in one response: the filtered record
/// list, dropdown option sets, headline counts, and the per-showroom chart
/// series.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct DashboardData {
    pub hoardings: Vec<Hoarding>,
    // Distinct values feeding the filter dropdowns.
    pub places: Vec<String>,
    pub showrooms: Vec<String>,
    pub total_count: i64,
    /// Records whose renewal date falls within the next 30 days, inclusive.
    pub due_soon_count: i64,
    /// Record count per showroom name, sorted by name for stable chart order.
    pub by_showroom: BTreeMap<String, i64>,
}
