//! Core functionality for the pageant registration and voting backend.
//!
//! This crate provides the account model, the SQLite-backed store with its
//! append-only vote ledger, and the read-only reporting used by the HTTP
//! service.

pub mod account;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod reporting;
pub mod store;
pub mod types;

pub use account::{
    normalize_email, normalize_name, validate_password, Account, CompetitionRegistration,
    GalleryPhoto, Measurements, NewAccount, Payment, RegistrationDetails, SocialLinks,
    StoredPhoto, MIN_PASSWORD_LEN,
};
pub use config::StoreConfig;
pub use error::{AccountError, Result, StoreError};
pub use ledger::{CountDrift, VoteReceipt, VoteRecord};
pub use reporting::{
    approval_rate, CategoryReport, CategoryVotes, DailyVotes, DashboardOverview, PaymentStat,
    PublicCategoryStats, RecentRegistration, RevenueBucket, StatusCount, Timeframe,
};
pub use store::{
    AdminAccountQuery, AdminSort, ContestStore, PublicContestant, PublicContestantQuery,
    PublicSort, PUBLIC_ELIGIBILITY,
};
pub use types::{
    AccountId, Page, PageRequest, ParseEnumError, PaymentStatus, RegistrationStatus, Role,
    SortOrder,
};
