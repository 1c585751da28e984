//! Registration ledger: a user's registrations and a conference's seat counter.
//!
//! Per (user, conference) pair the ledger is a two-state machine:
//!
//! ```text
//!                register (seats > 0)
//! NotRegistered ─────────────────────▶ Registered
//!               ◀─────────────────────
//!                    unregister
//! ```
//!
//! `register` on `Registered` fails with `AlreadyRegistered`, and on a sold-out conference
//! with `NoSeatsAvailable`. `unregister` on `NotRegistered` is not an error: it returns
//! `false` and changes nothing.
//!
//! The profile and the conference usually live in different entity groups (the conference
//! belongs to its organizer), so every transition runs in one transaction enlisting both.

use crate::metrics::RegistrationMetrics;
use crate::transaction::TransactionRunner;
use conference_core::{
    Caller, Conference, ConferenceError, EntityKey, Kind, Profile, Transaction, TransactionExt,
};

/// Transactional register/unregister.
#[derive(Clone)]
pub struct RegistrationLedger {
    runner: TransactionRunner,
}

impl RegistrationLedger {
    /// Ledger running its transactions through `runner`.
    #[must_use]
    pub const fn new(runner: TransactionRunner) -> Self {
        Self { runner }
    }

    /// Register `caller` for the conference at `conference_key`.
    ///
    /// Creates the caller's profile if this is the first time they are seen.
    /// Returns `true` on success.
    ///
    /// # Errors
    ///
    /// - `ConferenceNotFound`: no such conference
    /// - `AlreadyRegistered`: the caller is already registered
    /// - `NoSeatsAvailable`: the conference is full
    /// - `TransientConflict`: contention outlasted the retry policy
    pub async fn register(
        &self,
        caller: &Caller,
        conference_key: &EntityKey,
    ) -> Result<bool, ConferenceError> {
        ensure_conference_key(conference_key)?;

        let groups = vec![caller.profile_key().group(), conference_key.group()];
        let (caller_owned, key_owned) = (caller.clone(), conference_key.clone());
        let result = self
            .runner
            .run(groups, move |txn| {
                let caller = caller_owned.clone();
                let conference_key = key_owned.clone();
                Box::pin(async move { register_in(txn, &caller, &conference_key).await })
            })
            .await;

        match &result {
            Ok(_) => {
                RegistrationMetrics::record_register("registered");
                tracing::info!(
                    user_id = %caller.user_id,
                    conference_key = %conference_key,
                    "Registration committed"
                );
            }
            Err(err) => {
                RegistrationMetrics::record_register(outcome(err));
                tracing::debug!(
                    user_id = %caller.user_id,
                    conference_key = %conference_key,
                    error = %err,
                    "Registration rejected"
                );
            }
        }
        result
    }

    /// Unregister `caller` from the conference at `conference_key`.
    ///
    /// Returns `true` if a registration was removed and `false` if the caller was not
    /// registered.
    ///
    /// # Errors
    ///
    /// - `ConferenceNotFound`: no such conference
    /// - `TransientConflict`: contention outlasted the retry policy
    pub async fn unregister(
        &self,
        caller: &Caller,
        conference_key: &EntityKey,
    ) -> Result<bool, ConferenceError> {
        ensure_conference_key(conference_key)?;

        let groups = vec![caller.profile_key().group(), conference_key.group()];
        let (caller_owned, key_owned) = (caller.clone(), conference_key.clone());
        let result = self
            .runner
            .run(groups, move |txn| {
                let caller = caller_owned.clone();
                let conference_key = key_owned.clone();
                Box::pin(async move { unregister_in(txn, &caller, &conference_key).await })
            })
            .await;

        match &result {
            Ok(true) => {
                RegistrationMetrics::record_unregister("unregistered");
                tracing::info!(
                    user_id = %caller.user_id,
                    conference_key = %conference_key,
                    "Unregistration committed"
                );
            }
            Ok(false) => RegistrationMetrics::record_unregister("not_registered"),
            Err(err) => RegistrationMetrics::record_unregister(outcome(err)),
        }
        result
    }
}

fn ensure_conference_key(key: &EntityKey) -> Result<(), ConferenceError> {
    if key.kind() == Kind::Conference {
        Ok(())
    } else {
        Err(ConferenceError::ConferenceNotFound(key.clone()))
    }
}

async fn register_in(
    txn: &mut dyn Transaction,
    caller: &Caller,
    conference_key: &EntityKey,
) -> Result<bool, ConferenceError> {
    let profile_key = caller.profile_key();
    let mut conference: Conference = txn
        .load(conference_key)
        .await?
        .ok_or_else(|| ConferenceError::ConferenceNotFound(conference_key.clone()))?;
    let mut profile: Profile = txn
        .load(&profile_key)
        .await?
        .unwrap_or_else(|| caller.default_profile());

    if profile.is_attending(conference_key) {
        return Err(ConferenceError::AlreadyRegistered);
    }
    if conference.seats_available == 0 {
        return Err(ConferenceError::NoSeatsAvailable);
    }

    profile.conference_keys_to_attend.push(conference_key.clone());
    conference.seats_available -= 1;

    txn.save(&profile_key, &profile)?;
    txn.save(conference_key, &conference)?;
    Ok(true)
}

async fn unregister_in(
    txn: &mut dyn Transaction,
    caller: &Caller,
    conference_key: &EntityKey,
) -> Result<bool, ConferenceError> {
    let profile_key = caller.profile_key();
    let mut conference: Conference = txn
        .load(conference_key)
        .await?
        .ok_or_else(|| ConferenceError::ConferenceNotFound(conference_key.clone()))?;
    let Some(mut profile) = txn.load::<Profile>(&profile_key).await? else {
        return Ok(false);
    };

    let before = profile.conference_keys_to_attend.len();
    profile.conference_keys_to_attend.retain(|k| k != conference_key);
    if profile.conference_keys_to_attend.len() == before {
        return Ok(false);
    }
    conference.seats_available = (conference.seats_available + 1).min(conference.max_attendees);

    txn.save(&profile_key, &profile)?;
    txn.save(conference_key, &conference)?;
    Ok(true)
}

const fn outcome(err: &ConferenceError) -> &'static str {
    match err {
        ConferenceError::AlreadyRegistered => "already_registered",
        ConferenceError::NoSeatsAvailable => "sold_out",
        ConferenceError::ConferenceNotFound(_) => "not_found",
        ConferenceError::TransientConflict { .. } => "conflict",
        _ => "error",
    }
}
