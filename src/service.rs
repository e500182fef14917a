use crate::auth::hash_password;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{
    DashboardData, Hoarding, HoardingFields, HoardingFilter, HoardingForm, ImageUpload, User,
};
use crate::policy::{Action, authorize};
use crate::repository::{HoardingStoreState, UserStoreState};
use crate::storage::ImageStoreState;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

/// How far ahead the dashboard looks for renewals coming due.
pub const RENEWAL_HORIZON_DAYS: i64 = 30;

/// RecordService
///
/// Orchestrates the record lifecycle: every create/edit/delete/list use case
/// runs through here, combining the authorization policy, the image store,
/// and the persistence traits. Handlers stay thin; this is where the order of
/// operations (load, authorize, validate, attach image, persist) is fixed.
pub struct RecordService {
    users: UserStoreState,
    hoardings: HoardingStoreState,
    images: ImageStoreState,
}

/// ServiceState
///
/// The concrete type used to share the lifecycle service across the application state.
pub type ServiceState = Arc<RecordService>;

impl RecordService {
    pub fn new(
        users: UserStoreState,
        hoardings: HoardingStoreState,
        images: ImageStoreState,
    ) -> Self {
        Self {
            users,
            hoardings,
            images,
        }
    }

    /// view_dashboard
    ///
    /// Read-only composition of the repository queries: the filtered record
    /// list plus everything the dashboard shows around it (dropdown options,
    /// headline counts, per-showroom chart data). The "due soon" window is a
    /// fixed 30-day horizon from the current date at call time.
    pub async fn view_dashboard(&self, filter: &HoardingFilter) -> AppResult<DashboardData> {
        let hoardings = self.hoardings.list(filter).await?;
        let places = self.hoardings.distinct_places().await?;
        let showrooms = self.hoardings.distinct_showrooms().await?;
        let total_count = self.hoardings.count_total().await?;
        let due_soon_count = self.hoardings.count_due_within(RENEWAL_HORIZON_DAYS).await?;
        let by_showroom = self.hoardings.aggregate_by_showroom().await?;

        Ok(DashboardData {
            hoardings,
            places,
            showrooms,
            total_count,
            due_soon_count,
            by_showroom,
        })
    }

    /// create_hoarding
    ///
    /// Validates the submitted fields, hands the optional upload to the image
    /// store, and persists the record owned by the acting user.
    pub async fn create_hoarding(
        &self,
        actor: &User,
        form: HoardingForm,
        upload: Option<ImageUpload>,
    ) -> AppResult<Hoarding> {
        let fields = validate_form(&form)?;
        let image = self.images.accept(upload).await?;
        let record = self
            .hoardings
            .add(&fields, image.as_deref(), actor.id)
            .await?;
        tracing::info!(id = %record.id, user = %actor.email, "hoarding added");
        Ok(record)
    }

    /// edit_hoarding
    ///
    /// Loads the record, checks Edit authorization (owner or admin), then
    /// validates and applies the replacement fields. A new upload replaces
    /// the image reference; the old file stays on disk untouched.
    pub async fn edit_hoarding(
        &self,
        actor: &User,
        id: Uuid,
        form: HoardingForm,
        upload: Option<ImageUpload>,
    ) -> AppResult<Hoarding> {
        let existing = self
            .hoardings
            .get(id)
            .await?
            .ok_or(AppError::NotFound("hoarding"))?;

        if !authorize(actor, Action::Edit(&existing)).is_allowed() {
            return Err(AppError::Denied("Access denied."));
        }

        let fields = validate_form(&form)?;
        let image = self.images.accept(upload).await?;

        let updated = self
            .hoardings
            .update(id, &fields, image.as_deref())
            .await?
            // The record can vanish between the load and the write; same outcome.
            .ok_or(AppError::NotFound("hoarding"))?;
        tracing::info!(id = %updated.id, user = %actor.email, "hoarding updated");
        Ok(updated)
    }

    /// delete_hoarding
    ///
    /// Admin-only removal. Deletion is permanent and immediate; the
    /// associated image file is deliberately left in place.
    pub async fn delete_hoarding(&self, actor: &User, id: Uuid) -> AppResult<()> {
        let existing = self
            .hoardings
            .get(id)
            .await?
            .ok_or(AppError::NotFound("hoarding"))?;

        if !authorize(actor, Action::Delete).is_allowed() {
            return Err(AppError::Denied("Only admin can delete hoardings."));
        }

        if !self.hoardings.delete(existing.id).await? {
            return Err(AppError::NotFound("hoarding"));
        }
        tracing::info!(id = %id, user = %actor.email, "hoarding deleted");
        Ok(())
    }

    /// create_user
    ///
    /// Admin-only user provisioning. The authorization check runs before the
    /// password is even hashed; a duplicate email leaves the original user's
    /// credential untouched.
    pub async fn create_user(
        &self,
        actor: &User,
        email: &str,
        password: &str,
        is_admin: bool,
    ) -> AppResult<User> {
        if !authorize(actor, Action::CreateUser).is_allowed() {
            return Err(AppError::Denied("Access denied."));
        }

        let hash = hash_password(password)?;
        let created = self
            .users
            .add_user(email, &hash, is_admin)
            .await?
            .ok_or(AppError::AlreadyExists("User already exists."))?;
        tracing::info!(user = %created.email, is_admin, "user created");
        Ok(created)
    }

    /// list_users
    pub async fn list_users(&self, actor: &User) -> AppResult<Vec<User>> {
        if !authorize(actor, Action::ListUsers).is_allowed() {
            return Err(AppError::Denied("Access denied."));
        }
        self.users.list_users().await
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// validate_form
///
/// Turns the raw submission into typed fields. Every persisted field is
/// mapped here by name, one line each, so nothing can be mass-assigned by
/// adding a form key. Showroom fields are the only optional ones.
pub fn validate_form(form: &HoardingForm) -> Result<HoardingFields, ValidationError> {
    let size = required(&form.size, "size")?.to_string();
    let place = required(&form.place, "place")?.to_string();
    let owner_name = required(&form.owner_name, "owner_name")?.to_string();
    let contact = required(&form.contact, "contact")?.to_string();
    let address = required(&form.address, "address")?.to_string();
    let location_url = required(&form.location_url, "location_url")?.to_string();

    let renewal_date = NaiveDate::parse_from_str(
        required(&form.renewal_date, "renewal_date")?,
        "%Y-%m-%d",
    )
    .map_err(|_| ValidationError::MalformedField {
        field: "renewal_date",
        reason: "expected YYYY-MM-DD",
    })?;

    let amount: f64 = required(&form.amount, "amount")?
        .parse()
        .ok()
        .filter(|a: &f64| a.is_finite())
        .ok_or(ValidationError::MalformedField {
            field: "amount",
            reason: "expected a number",
        })?;

    Ok(HoardingFields {
        size,
        place,
        owner_name,
        contact,
        address,
        location_url,
        showroom_name: optional(&form.showroom_name),
        showroom_location: optional(&form.showroom_location),
        renewal_date,
        amount,
    })
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    fn full_form() -> HoardingForm {
        HoardingForm {
            size: Some("20x10".into()),
            place: Some("MG Road".into()),
            owner_name: Some("R. Sharma".into()),
            contact: Some("9876543210".into()),
            address: Some("12 MG Road".into()),
            location_url: Some("https://maps.example.com/x".into()),
            showroom_name: Some("Downtown".into()),
            showroom_location: Some("Kochi".into()),
            renewal_date: Some("2026-03-15".into()),
            amount: Some("15000".into()),
        }
    }

    #[test]
    fn accepts_a_complete_form() {
        let fields = validate_form(&full_form()).expect("valid form");
        assert_eq!(fields.place, "MG Road");
        assert_eq!(fields.renewal_date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(fields.amount, 15000.0);
    }

    #[test]
    fn missing_place_is_reported_by_name() {
        let mut form = full_form();
        form.place = None;
        assert_eq!(
            validate_form(&form),
            Err(ValidationError::MissingField("place"))
        );
    }

    #[test]
    fn whitespace_only_counts_as_missing() {
        let mut form = full_form();
        form.owner_name = Some("   ".into());
        assert_eq!(
            validate_form(&form),
            Err(ValidationError::MissingField("owner_name"))
        );
    }

    #[test]
    fn bad_date_is_malformed() {
        let mut form = full_form();
        form.renewal_date = Some("15/03/2026".into());
        assert!(matches!(
            validate_form(&form),
            Err(ValidationError::MalformedField {
                field: "renewal_date",
                ..
            })
        ));
    }

    #[test]
    fn non_numeric_amount_is_malformed() {
        let mut form = full_form();
        form.amount = Some("lots".into());
        assert!(matches!(
            validate_form(&form),
            Err(ValidationError::MalformedField { field: "amount", .. })
        ));
    }

    #[test]
    fn showroom_fields_may_be_blank() {
        let mut form = full_form();
        form.showroom_name = Some("".into());
        form.showroom_location = None;
        let fields = validate_form(&form).expect("valid form");
        assert_eq!(fields.showroom_name, None);
        assert_eq!(fields.showroom_location, None);
    }
}
