//! Account aggregate.
//!
//! An [`Account`] carries identity, payment sub-state and the embedded
//! [`CompetitionRegistration`]. Every state transition that the HTTP layer can
//! trigger is a method here, so the approved-before-completed rule is checked
//! in exactly one place: [`Account::complete_registration`].
//!
//! `votes_count` is a projection of the vote ledger. Nothing in this module
//! changes it; the store increments it in place when a vote is recorded and
//! never writes it back on save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AccountError;
use crate::types::{AccountId, PaymentStatus, RegistrationStatus, Role};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// A registrant or admin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    #[serde(flatten)]
    pub payment: Payment,
    pub competition_registration: CompetitionRegistration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment sub-state, flattened into the account on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "paymentStatus")]
    pub status: PaymentStatus,
    pub payment_id: Option<String>,
    #[serde(rename = "paymentAmount")]
    pub amount: f64,
    #[serde(rename = "paymentDate")]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "paymentNotes")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Measurements {
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bust: Option<f64>,
    pub waist: Option<f64>,
    pub hips: Option<f64>,
}

/// Reference returned by the file storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPhoto {
    pub id: String,
    pub url: String,
}

/// One entry of the competition gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryPhoto {
    pub id: String,
    pub url: String,
    pub caption: String,
}

/// Competition profile embedded in an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionRegistration {
    pub status: RegistrationStatus,
    pub category: Option<String>,
    pub age: Option<u32>,
    pub biography: Option<String>,
    pub photo_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub social_media_links: SocialLinks,
    pub measurements: Measurements,
    pub talents: Vec<String>,
    pub achievements: Vec<String>,
    pub votes_count: u64,
    pub is_publicly_visible: bool,
    pub approval_date: Option<DateTime<Utc>>,
    pub profile_photo: Option<StoredPhoto>,
    pub photos: Vec<GalleryPhoto>,
}

/// Details submitted when completing the competition registration
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetails {
    pub category: String,
    pub age: Option<u32>,
    pub biography: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub social_media_links: SocialLinks,
    #[serde(default)]
    pub measurements: Measurements,
    #[serde(default)]
    pub talents: Vec<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
}

impl RegistrationDetails {
    fn validate(&self) -> Result<(), AccountError> {
        if self.category.trim().is_empty() {
            return Err(AccountError::InvalidField {
                field: "category",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(age) = self.age {
            if !(1..=120).contains(&age) {
                return Err(AccountError::InvalidField {
                    field: "age",
                    reason: format!("{age} is out of range"),
                });
            }
        }
        Ok(())
    }
}

/// Input for a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl NewAccount {
    /// Normalize and validate identity fields
    pub fn new(
        name: &str,
        email: &str,
        password_hash: String,
        role: Role,
    ) -> Result<Self, AccountError> {
        Ok(Self {
            name: normalize_name(name)?,
            email: normalize_email(email)?,
            password_hash,
            role,
        })
    }
}

/// Trim a display name and reject empty ones
pub fn normalize_name(name: &str) -> Result<String, AccountError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccountError::InvalidField {
            field: "name",
            reason: "Please provide a name".to_string(),
        });
    }
    Ok(name.to_string())
}

/// Lower-case an email and check the `local@domain.tld` shape
pub fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    let invalid = || AccountError::InvalidField {
        field: "email",
        reason: "Please provide a valid email".to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if local.is_empty() || host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(email)
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`]
pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::InvalidField {
            field: "password",
            reason: format!("must be at least {MIN_PASSWORD_LEN} characters"),
        });
    }
    Ok(())
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The three-clause predicate gating public visibility.
    ///
    /// Mirrors `store::PUBLIC_ELIGIBILITY`; the two must stay in lock-step.
    pub fn is_publicly_eligible(&self) -> bool {
        self.payment.status == PaymentStatus::Approved
            && self.competition_registration.status == RegistrationStatus::Completed
            && self.competition_registration.is_publicly_visible
    }

    /// User-submitted payment proof moves the account to `processing`
    pub fn submit_payment(
        &mut self,
        payment_id: &str,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Err(AccountError::InvalidField {
                field: "paymentId",
                reason: "must not be empty".to_string(),
            });
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(AccountError::InvalidField {
                field: "amount",
                reason: "must be a non-negative number".to_string(),
            });
        }

        self.payment.payment_id = Some(payment_id.to_string());
        self.payment.amount = amount;
        self.payment.status = PaymentStatus::Processing;
        self.updated_at = now;
        Ok(())
    }

    /// Record a payment reference without changing the review state
    pub fn set_payment_id(&mut self, payment_id: Option<String>, now: DateTime<Utc>) {
        self.payment.payment_id = payment_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        self.updated_at = now;
    }

    /// Admin review decision. Approval stamps the payment date and the
    /// competition approval date.
    pub fn review_payment(
        &mut self,
        status: PaymentStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.payment.status = status;
        self.payment.notes = notes;
        if status == PaymentStatus::Approved {
            self.payment.date = Some(now);
            self.competition_registration.approval_date = Some(now);
        }
        self.updated_at = now;
    }

    pub fn set_public_visibility(&mut self, visible: bool, now: DateTime<Utc>) {
        self.competition_registration.is_publicly_visible = visible;
        self.updated_at = now;
    }

    /// Complete the competition registration.
    ///
    /// Only reachable once payment is approved. Votes, photos, visibility and
    /// approval date carry over; the profile details are replaced.
    pub fn complete_registration(
        &mut self,
        details: RegistrationDetails,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        if self.payment.status != PaymentStatus::Approved {
            return Err(AccountError::PaymentNotApproved);
        }
        details.validate()?;

        let registration = &mut self.competition_registration;
        registration.status = RegistrationStatus::Completed;
        registration.category = Some(details.category.trim().to_string());
        registration.age = details.age;
        registration.biography = details.biography;
        registration.photo_url = details.photo_url;
        registration.social_media_links = details.social_media_links;
        registration.measurements = details.measurements;
        registration.talents = details.talents;
        registration.achievements = details.achievements;
        registration.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Replace the profile photo, returning the one it displaced
    pub fn replace_profile_photo(
        &mut self,
        photo: StoredPhoto,
        now: DateTime<Utc>,
    ) -> Option<StoredPhoto> {
        self.updated_at = now;
        self.competition_registration.profile_photo.replace(photo)
    }

    pub fn add_gallery_photos(&mut self, photos: &[GalleryPhoto], now: DateTime<Utc>) {
        self.competition_registration
            .photos
            .extend(photos.iter().cloned());
        self.updated_at = now;
    }

    pub fn gallery_photo(&self, photo_id: &str) -> Option<&GalleryPhoto> {
        self.competition_registration
            .photos
            .iter()
            .find(|p| p.id == photo_id)
    }

    pub fn remove_gallery_photo(
        &mut self,
        photo_id: &str,
        now: DateTime<Utc>,
    ) -> Result<GalleryPhoto, AccountError> {
        let photos = &mut self.competition_registration.photos;
        let index = photos
            .iter()
            .position(|p| p.id == photo_id)
            .ok_or_else(|| AccountError::PhotoNotFound(photo_id.to_string()))?;
        self.updated_at = now;
        Ok(photos.remove(index))
    }
}
