use chrono::Utc;
use pageant_core::{
    validate_password, Account, AccountId, ContestStore, NewAccount, Role, StoreConfig,
    StoreError,
};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::auth::{hash_password, Blake3Hasher, CredentialHasher, SessionSigner};
use crate::config::{AdminBootstrap, Config};
use crate::error::ApiError;
use crate::mailer::{self, HttpMailRelay, LogMailer, MailMessage, Mailer};
use crate::media::{MemoryPhotoStorage, PhotoStorage, S3PhotoStorage};

pub struct AppState {
    store: Arc<Mutex<ContestStore>>,
    pub sessions: SessionSigner,
    pub hasher: Arc<dyn CredentialHasher>,
    pub mailer: Arc<dyn Mailer>,
    pub photos: Arc<dyn PhotoStorage>,
}

impl AppState {
    pub fn new(
        store: ContestStore,
        sessions: SessionSigner,
        hasher: Arc<dyn CredentialHasher>,
        mailer: Arc<dyn Mailer>,
        photos: Arc<dyn PhotoStorage>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            sessions,
            hasher,
            mailer,
            photos,
        }
    }

    /// Wire up production collaborators from `config`
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = ContestStore::open(&StoreConfig::new(&config.database_path))?;

        let sessions = match &config.session_key {
            Some(seed) => SessionSigner::from_seed(seed, config.session_ttl),
            None => SessionSigner::ephemeral(config.session_ttl),
        };

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => Arc::new(HttpMailRelay::new(mail.relay_url.clone(), mail.from.clone())),
            None => Arc::new(LogMailer),
        };

        let photos: Arc<dyn PhotoStorage> = match &config.photos {
            Some(p) => Arc::new(S3PhotoStorage::from_env(p.bucket.clone(), p.public_url.clone()).await),
            None => {
                warn!("PHOTO_BUCKET not set; photos are kept in memory only");
                Arc::new(MemoryPhotoStorage::new())
            }
        };

        let state = Self::new(
            store,
            sessions,
            Arc::new(Blake3Hasher::default()),
            mailer,
            photos,
        );

        if let Some(admin) = &config.bootstrap_admin {
            state.bootstrap_admin(admin).await?;
        }

        Ok(state)
    }

    /// Run `f` against the store on the blocking pool
    pub async fn with_store<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut ContestStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store
                .lock()
                .map_err(|_| ApiError::Internal("store lock poisoned".to_string()))?;
            f(&mut guard).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
    }

    /// Load-modify-save under one lock so concurrent requests cannot interleave
    pub async fn update_account<F, T>(&self, id: AccountId, f: F) -> Result<(Account, T), ApiError>
    where
        F: FnOnce(&mut Account) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.with_store(move |store| {
            let mut account = store.account(id)?;
            let out = f(&mut account)?;
            store.save_account(&account)?;
            Ok((account, out))
        })
        .await
    }

    pub fn notify(&self, message: MailMessage) {
        mailer::dispatch(Arc::clone(&self.mailer), message);
    }

    /// Create the first admin, or promote an existing account, when none exists
    pub async fn bootstrap_admin(&self, admin: &AdminBootstrap) -> Result<(), ApiError> {
        if self.with_store(|store| store.has_admin()).await? {
            return Ok(());
        }

        validate_password(&admin.password)?;
        let new = NewAccount::new("Administrator", &admin.email, String::new(), Role::Admin)?;
        let hash = hash_password(self, admin.password.clone()).await?;

        let account = self
            .with_store(move |store| {
                let now = Utc::now();
                match store.find_by_email(&new.email)? {
                    Some(mut existing) => {
                        existing.role = Role::Admin;
                        existing.updated_at = now;
                        store.save_account(&existing)?;
                        Ok(existing)
                    }
                    None => store.create_account(NewAccount { password_hash: hash, ..new }, now),
                }
            })
            .await?;

        info!(account_id = %account.id, email = %account.email, "Bootstrap admin ready");
        Ok(())
    }
}
