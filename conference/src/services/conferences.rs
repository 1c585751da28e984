//! Conference operations: creation, organizer updates, queries and registration.

use super::profiles::ProfileService;
use super::{parse_date, parse_key, provided};
use crate::forms::{ConferenceForm, ConferenceView};
use chrono::NaiveDate;
use conference_core::types::{DEFAULT_CITY, DEFAULT_TOPICS};
use conference_core::{
    Caller, Conference, ConferenceError, EntityKey, EntityStore, EntityStoreExt, FilterCompiler,
    FilterSpec, Kind, NotificationSink, Profile, Query, Record, SortKey, Task, TransactionExt,
};
use conference_runtime::metrics::CatalogMetrics;
use conference_runtime::{RegistrationLedger, TransactionRunner};
use std::sync::Arc;

/// Conference catalogue and registration.
#[derive(Clone)]
pub struct ConferenceService {
    store: Arc<dyn EntityStore>,
    runner: TransactionRunner,
    ledger: RegistrationLedger,
    profiles: ProfileService,
    notifications: Arc<dyn NotificationSink>,
}

impl ConferenceService {
    /// Wire the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        runner: TransactionRunner,
        ledger: RegistrationLedger,
        profiles: ProfileService,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            runner,
            ledger,
            profiles,
            notifications,
        }
    }

    /// Create a conference organised by the caller.
    ///
    /// Missing fields get defaults: city "Default City", topics `["Default", "Topic"]`,
    /// no capacity. A confirmation email is queued once the conference is stored.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::MissingField`] without a name
    /// - [`ConferenceError::InvalidDate`] if a date does not start with `YYYY-MM-DD`
    pub async fn create_conference(
        &self,
        caller: &Caller,
        form: ConferenceForm,
    ) -> Result<ConferenceView, ConferenceError> {
        let name = provided(form.name.as_deref())
            .ok_or(ConferenceError::MissingField("name"))?
            .to_string();
        let start_date = form.start_date.as_deref().map(parse_date).transpose()?;
        let end_date = form.end_date.as_deref().map(parse_date).transpose()?;
        let max_attendees = form.max_attendees.unwrap_or(0);

        let conference = Conference {
            name,
            description: form.description,
            organizer_user_id: caller.user_id.clone(),
            topics: form
                .topics
                .filter(|topics| !topics.is_empty())
                .unwrap_or_else(|| DEFAULT_TOPICS.iter().map(ToString::to_string).collect()),
            city: provided(form.city.as_deref()).unwrap_or(DEFAULT_CITY).to_string(),
            start_date,
            end_date,
            month: Conference::month_of(start_date),
            max_attendees,
            seats_available: max_attendees,
        };

        let organizer = self.profiles.get_profile(caller).await?;
        let key = self
            .store
            .allocate_id(Kind::Conference, Some(organizer.key()))
            .await?;
        self.store.save(&key, &conference).await?;

        CatalogMetrics::record_conference_created();
        tracing::info!(
            conference_key = %key,
            organizer = %caller.user_id,
            max_attendees,
            "Conference created"
        );

        self.notifications.enqueue(Task::SendConfirmationEmail {
            email: caller.email.clone(),
            conference_info: conference.summary(),
        });

        Ok(ConferenceView::new(
            Record::new(key, conference),
            organizer.display_name,
        ))
    }

    /// Update the provided fields of a conference the caller organises.
    ///
    /// Changing `maxAttendees` moves `seatsAvailable` by the same amount.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::ConferenceNotFound`] for an unknown key
    /// - [`ConferenceError::Forbidden`] if the caller is not the organizer
    /// - [`ConferenceError::InvalidCapacity`] below the number of registered attendees
    pub async fn update_conference(
        &self,
        caller: &Caller,
        websafe_key: &str,
        form: ConferenceForm,
    ) -> Result<ConferenceView, ConferenceError> {
        let key = parse_key(websafe_key, Kind::Conference)?;
        let start_date = form.start_date.as_deref().map(parse_date).transpose()?;
        let end_date = form.end_date.as_deref().map(parse_date).transpose()?;

        let (user_id, key_owned) = (caller.user_id.clone(), key.clone());
        let conference = self
            .runner
            .run(vec![key.group()], move |txn| {
                let user_id = user_id.clone();
                let key = key_owned.clone();
                let form = form.clone();
                Box::pin(async move {
                    let mut conference: Conference = txn
                        .load(&key)
                        .await?
                        .ok_or_else(|| ConferenceError::ConferenceNotFound(key.clone()))?;
                    if conference.organizer_user_id != user_id {
                        return Err(ConferenceError::Forbidden(
                            "Only the owner can update the conference.".to_string(),
                        ));
                    }
                    apply_update(&mut conference, &form, start_date, end_date)?;
                    txn.save(&key, &conference)?;
                    Ok(conference)
                })
            })
            .await?;

        tracing::info!(conference_key = %key, "Conference updated");
        self.render_one(Record::new(key, conference)).await
    }

    /// Load one conference.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::ConferenceNotFound`] for an unknown key.
    pub async fn get_conference(&self, websafe_key: &str) -> Result<ConferenceView, ConferenceError> {
        let key = parse_key(websafe_key, Kind::Conference)?;
        let conference = self
            .store
            .load::<Conference>(&key)
            .await?
            .ok_or_else(|| ConferenceError::ConferenceNotFound(key.clone()))?;
        self.render_one(Record::new(key, conference)).await
    }

    /// Conferences organised by the caller, by name.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn conferences_created(
        &self,
        caller: &Caller,
    ) -> Result<Vec<ConferenceView>, ConferenceError> {
        let query = Query::new(Kind::Conference)
            .with_ancestor(caller.profile_key())
            .order_by(SortKey::ascending("name"));
        let records = self.store.query_models::<Conference>(query).await?;
        self.render(records).await
    }

    /// Conferences matching every filter triple.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Filter`] for an invalid field, operator or value, or a
    /// second inequality field.
    pub async fn query_conferences(
        &self,
        filters: &[FilterSpec],
    ) -> Result<Vec<ConferenceView>, ConferenceError> {
        let plan = FilterCompiler::conferences().compile(filters)?;
        tracing::debug!(
            filters = filters.len(),
            inequality = ?plan.inequality_property,
            "Conference query compiled"
        );
        let records = self
            .store
            .query_models::<Conference>(plan.into_query(Kind::Conference))
            .await?;
        self.render(records).await
    }

    /// Conferences the caller is registered for, in registration order.
    ///
    /// Conferences deleted since registration are skipped.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn conferences_to_attend(
        &self,
        caller: &Caller,
    ) -> Result<Vec<ConferenceView>, ConferenceError> {
        let Some(profile) = self.store.load::<Profile>(&caller.profile_key()).await? else {
            return Ok(Vec::new());
        };
        let records = self
            .store
            .get_multi(profile.conference_keys_to_attend)
            .await?
            .iter()
            .flatten()
            .map(Record::from_entity)
            .collect::<Result<Vec<Record<Conference>>, _>>()?;
        self.render(records).await
    }

    /// Register the caller for a conference.
    ///
    /// # Errors
    ///
    /// See [`RegistrationLedger::register`].
    pub async fn register(&self, caller: &Caller, websafe_key: &str) -> Result<bool, ConferenceError> {
        let key = parse_key(websafe_key, Kind::Conference)?;
        self.ledger.register(caller, &key).await
    }

    /// Cancel the caller's registration.
    ///
    /// # Errors
    ///
    /// See [`RegistrationLedger::unregister`].
    pub async fn unregister(
        &self,
        caller: &Caller,
        websafe_key: &str,
    ) -> Result<bool, ConferenceError> {
        let key = parse_key(websafe_key, Kind::Conference)?;
        self.ledger.unregister(caller, &key).await
    }

    async fn render_one(&self, record: Record<Conference>) -> Result<ConferenceView, ConferenceError> {
        let organizer = EntityKey::profile(&record.model.organizer_user_id);
        let display_name = self
            .store
            .load::<Profile>(&organizer)
            .await?
            .map(|p| p.display_name)
            .unwrap_or_default();
        Ok(ConferenceView::new(record, display_name))
    }

    /// Attach organizer display names, fetched with a single `get_multi`.
    async fn render(
        &self,
        records: Vec<Record<Conference>>,
    ) -> Result<Vec<ConferenceView>, ConferenceError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let organizers: Vec<EntityKey> = records
            .iter()
            .map(|r| EntityKey::profile(&r.model.organizer_user_id))
            .collect();
        let profiles = self.store.get_multi(organizers).await?;

        records
            .into_iter()
            .zip(profiles)
            .map(|(record, profile)| -> Result<ConferenceView, ConferenceError> {
                let display_name = profile
                    .map(|entity| entity.to_model::<Profile>())
                    .transpose()?
                    .map(|p| p.display_name)
                    .unwrap_or_default();
                Ok(ConferenceView::new(record, display_name))
            })
            .collect()
    }
}

fn apply_update(
    conference: &mut Conference,
    form: &ConferenceForm,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<(), ConferenceError> {
    if let Some(name) = provided(form.name.as_deref()) {
        conference.name = name.to_string();
    }
    if let Some(description) = &form.description {
        conference.description = Some(description.clone());
    }
    if let Some(topics) = &form.topics {
        conference.topics.clone_from(topics);
    }
    if let Some(city) = provided(form.city.as_deref()) {
        conference.city = city.to_string();
    }
    if let Some(start) = start_date {
        conference.start_date = Some(start);
        conference.month = Conference::month_of(Some(start));
    }
    if let Some(end) = end_date {
        conference.end_date = Some(end);
    }
    if let Some(requested) = form.max_attendees {
        let registered = conference.registered();
        if requested < registered {
            return Err(ConferenceError::InvalidCapacity {
                requested,
                registered,
            });
        }
        conference.max_attendees = requested;
        conference.seats_available = requested - registered;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conference_testing::fixtures;

    #[test]
    fn capacity_change_keeps_registrations() {
        let mut conference = fixtures::conference("org", "RustConf", 10);
        conference.seats_available = 6;

        let form = ConferenceForm {
            max_attendees: Some(20),
            ..ConferenceForm::default()
        };
        apply_update(&mut conference, &form, None, None).unwrap();
        assert_eq!((conference.max_attendees, conference.seats_available), (20, 16));

        let form = ConferenceForm {
            max_attendees: Some(3),
            ..ConferenceForm::default()
        };
        let err = apply_update(&mut conference, &form, None, None).unwrap_err();
        assert!(matches!(
            err,
            ConferenceError::InvalidCapacity {
                requested: 3,
                registered: 4
            }
        ));
        assert_eq!(conference.max_attendees, 20);
    }

    #[test]
    fn start_date_moves_the_month() {
        let mut conference = fixtures::conference("org", "RustConf", 10);
        let start = NaiveDate::from_ymd_opt(2026, 11, 2);

        apply_update(&mut conference, &ConferenceForm::default(), start, None).unwrap();

        assert_eq!(conference.month, 11);
        assert_eq!(conference.start_date, start);
        assert_eq!(conference.name, "RustConf");
    }
}
