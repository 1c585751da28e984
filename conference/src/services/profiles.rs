//! Profile operations.

use super::provided;
use crate::forms::ProfileMiniForm;
use conference_core::{
    Caller, ConferenceError, EntityStore, EntityStoreExt, Profile, TransactionExt,
};
use conference_runtime::TransactionRunner;
use std::sync::Arc;

/// Profiles are created lazily the first time a caller is seen.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn EntityStore>,
    runner: TransactionRunner,
}

impl ProfileService {
    /// Service over `store`, writing through `runner`.
    #[must_use]
    pub const fn new(store: Arc<dyn EntityStore>, runner: TransactionRunner) -> Self {
        Self { store, runner }
    }

    /// The caller's profile, created from the identity headers if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError`] if the store fails or keeps conflicting.
    pub async fn get_profile(&self, caller: &Caller) -> Result<Profile, ConferenceError> {
        if let Some(profile) = self.store.load::<Profile>(&caller.profile_key()).await? {
            return Ok(profile);
        }

        let caller_owned = caller.clone();
        let profile = self
            .runner
            .run(vec![caller.profile_key().group()], move |txn| {
                let caller = caller_owned.clone();
                Box::pin(async move {
                    let key = caller.profile_key();
                    if let Some(existing) = txn.load::<Profile>(&key).await? {
                        return Ok(existing);
                    }
                    let profile = caller.default_profile();
                    txn.save(&key, &profile)?;
                    Ok(profile)
                })
            })
            .await?;

        tracing::info!(user_id = %caller.user_id, "Profile created");
        Ok(profile)
    }

    /// Update the caller's display name and tee-shirt size.
    ///
    /// Absent and blank fields leave the stored value untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError`] if the store fails or keeps conflicting.
    pub async fn save_profile(
        &self,
        caller: &Caller,
        form: ProfileMiniForm,
    ) -> Result<Profile, ConferenceError> {
        let caller_owned = caller.clone();
        self.runner
            .run(vec![caller.profile_key().group()], move |txn| {
                let caller = caller_owned.clone();
                let form = form.clone();
                Box::pin(async move {
                    let key = caller.profile_key();
                    let mut profile = txn
                        .load::<Profile>(&key)
                        .await?
                        .unwrap_or_else(|| caller.default_profile());

                    if let Some(name) = provided(form.display_name.as_deref()) {
                        profile.display_name = name.to_string();
                    }
                    if let Some(size) = form.tee_shirt_size {
                        profile.tee_shirt_size = size;
                    }

                    txn.save(&key, &profile)?;
                    Ok(profile)
                })
            })
            .await
    }
}
