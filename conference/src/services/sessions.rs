//! Session operations.
//!
//! Every read goes through the session [`FilterCompiler`] so that client-supplied values
//! are coerced exactly like filter triples.

use super::{parse_date, parse_key, provided};
use crate::forms::{SessionForm, SessionView};
use conference_core::filter::parse_time;
use conference_core::types::{DEFAULT_HIGHLIGHTS, DEFAULT_SESSION_TYPE};
use conference_core::{
    Caller, Conference, ConferenceError, EntityKey, EntityStore, EntityStoreExt, FilterCompiler,
    FilterSpec, Kind, NotificationSink, Record, Session, Task,
};
use conference_runtime::metrics::CatalogMetrics;
use std::sync::Arc;

/// Sessions of type `workshop` are excluded from the evening query.
pub const WORKSHOP: &str = "workshop";

/// Sessions starting before this time count as "before seven".
pub const EVENING_CUTOFF: &str = "19:00";

/// Conference sessions.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn EntityStore>,
    notifications: Arc<dyn NotificationSink>,
}

impl SessionService {
    /// Wire the service.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Add a session to a conference the caller organises.
    ///
    /// If the speaker now has more than one session in the conference, a
    /// featured-speaker task is queued.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::MissingField`] for a missing name, speaker, duration, date or
    ///   start time
    /// - [`ConferenceError::InvalidDate`] / [`ConferenceError::InvalidTime`]
    /// - [`ConferenceError::ConferenceNotFound`] for an unknown conference
    /// - [`ConferenceError::Forbidden`] if the caller is not the organizer
    pub async fn create_session(
        &self,
        caller: &Caller,
        conference_key: &str,
        form: SessionForm,
    ) -> Result<SessionView, ConferenceError> {
        let conference_key = parse_key(conference_key, Kind::Conference)?;
        let session = build_session(form)?;

        let conference = self.conference(&conference_key).await?;
        if conference.organizer_user_id != caller.user_id {
            return Err(ConferenceError::Forbidden(
                "Only the owner can add sessions to the conference.".to_string(),
            ));
        }

        let key = self
            .store
            .allocate_id(Kind::Session, Some(conference_key.clone()))
            .await?;
        self.store.save(&key, &session).await?;

        CatalogMetrics::record_session_created();
        tracing::info!(
            session_key = %key,
            conference_key = %conference_key,
            speaker = %session.speaker,
            "Session created"
        );

        self.check_featured_speaker(caller, &session.speaker, &conference_key)
            .await;

        Ok(SessionView::from(Record::new(key, session)))
    }

    /// Every session of a conference, by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::ConferenceNotFound`] for an unknown conference.
    pub async fn conference_sessions(
        &self,
        conference_key: &str,
    ) -> Result<Vec<SessionView>, ConferenceError> {
        let conference_key = parse_key(conference_key, Kind::Conference)?;
        self.conference(&conference_key).await?;
        self.find(&[], Some(conference_key)).await
    }

    /// Sessions of one type in a conference.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::ConferenceNotFound`] for an unknown conference.
    pub async fn conference_sessions_by_type(
        &self,
        conference_key: &str,
        type_of_session: &str,
    ) -> Result<Vec<SessionView>, ConferenceError> {
        let conference_key = parse_key(conference_key, Kind::Conference)?;
        self.conference(&conference_key).await?;
        self.find(
            &[FilterSpec::new("TYPE_OF_SESSION", "EQ", type_of_session)],
            Some(conference_key),
        )
        .await
    }

    /// Sessions given by `speaker` across all conferences.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn sessions_by_speaker(
        &self,
        speaker: &str,
    ) -> Result<Vec<SessionView>, ConferenceError> {
        self.find(&[FilterSpec::new("SPEAKER", "EQ", speaker)], None)
            .await
    }

    /// Sessions by `speaker` lasting at most `max_duration` minutes, shortest first.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::MissingField`] for a blank speaker or a zero duration.
    pub async fn sessions_by_speaker_within_duration(
        &self,
        speaker: &str,
        max_duration: u32,
    ) -> Result<Vec<SessionView>, ConferenceError> {
        let speaker =
            provided(Some(speaker)).ok_or(ConferenceError::MissingField("speaker"))?;
        if max_duration == 0 {
            return Err(ConferenceError::MissingField("duration"));
        }
        self.find(
            &[
                FilterSpec::new("SPEAKER", "EQ", speaker),
                FilterSpec::new("DURATION", "GT", "0"),
                FilterSpec::new("DURATION", "LTEQ", max_duration.to_string()),
            ],
            None,
        )
        .await
    }

    /// Sessions of one type on one date.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::MissingField`] for a blank type or date
    /// - [`ConferenceError::Filter`] if `date` is not `YYYY-MM-DD`
    pub async fn sessions_by_type_on_date(
        &self,
        type_of_session: &str,
        date: &str,
    ) -> Result<Vec<SessionView>, ConferenceError> {
        let type_of_session = provided(Some(type_of_session))
            .ok_or(ConferenceError::MissingField("typeOfSession"))?;
        let date = provided(Some(date)).ok_or(ConferenceError::MissingField("date"))?;
        self.find(
            &[
                FilterSpec::new("TYPE_OF_SESSION", "EQ", type_of_session),
                FilterSpec::new("DATE", "EQ", date),
            ],
            None,
        )
        .await
    }

    /// Non-workshop sessions starting before 19:00.
    ///
    /// The store takes the start-time inequality; a second inequality on the type would
    /// break the single-inequality rule, so workshops are removed here.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn sessions_before_seven_excluding_workshops(
        &self,
    ) -> Result<Vec<SessionView>, ConferenceError> {
        let sessions = self
            .find(&[FilterSpec::new("START_TIME", "LT", EVENING_CUTOFF)], None)
            .await?;
        Ok(sessions
            .into_iter()
            .filter(|view| view.session.type_of_session != WORKSHOP)
            .collect())
    }

    async fn conference(&self, key: &EntityKey) -> Result<Conference, ConferenceError> {
        self.store
            .load::<Conference>(key)
            .await?
            .ok_or_else(|| ConferenceError::ConferenceNotFound(key.clone()))
    }

    async fn find(
        &self,
        filters: &[FilterSpec],
        ancestor: Option<EntityKey>,
    ) -> Result<Vec<SessionView>, ConferenceError> {
        let plan = FilterCompiler::sessions().compile(filters)?;
        let query = match ancestor {
            Some(ancestor) => plan.into_ancestor_query(Kind::Session, ancestor),
            None => plan.into_query(Kind::Session),
        };
        Ok(self
            .store
            .query_models::<Session>(query)
            .await?
            .into_iter()
            .map(SessionView::from)
            .collect())
    }

    /// The session is already stored, so a failing lookup is logged, not returned.
    async fn check_featured_speaker(&self, caller: &Caller, speaker: &str, conference_key: &EntityKey) {
        let sessions = self
            .find(
                &[FilterSpec::new("SPEAKER", "EQ", speaker)],
                Some(conference_key.clone()),
            )
            .await;

        match sessions {
            Ok(sessions) if sessions.len() > 1 => {
                self.notifications.enqueue(Task::SetFeaturedSpeaker {
                    email: caller.email.clone(),
                    speaker: speaker.to_string(),
                    conference_key: conference_key.clone(),
                });
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(speaker, error = %err, "Featured speaker check failed");
            }
        }
    }
}

fn build_session(form: SessionForm) -> Result<Session, ConferenceError> {
    let name = provided(form.name.as_deref()).ok_or(ConferenceError::MissingField("name"))?;
    let speaker =
        provided(form.speaker.as_deref()).ok_or(ConferenceError::MissingField("speaker"))?;
    let duration = form
        .duration
        .ok_or(ConferenceError::MissingField("duration"))?;
    let date = provided(form.date.as_deref()).ok_or(ConferenceError::MissingField("date"))?;
    let start_time =
        provided(form.start_time.as_deref()).ok_or(ConferenceError::MissingField("startTime"))?;

    Ok(Session {
        name: name.to_string(),
        highlights: provided(form.highlights.as_deref())
            .unwrap_or(DEFAULT_HIGHLIGHTS)
            .to_string(),
        speaker: speaker.to_string(),
        duration,
        type_of_session: provided(form.type_of_session.as_deref())
            .unwrap_or(DEFAULT_SESSION_TYPE)
            .to_lowercase(),
        date: parse_date(date)?,
        start_time: parse_time(start_time)
            .ok_or_else(|| ConferenceError::InvalidTime(start_time.to_string()))?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use conference_testing::{InMemoryEntityStore, RecordingNotificationSink};

    fn service() -> SessionService {
        SessionService::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(RecordingNotificationSink::new()),
        )
    }

    fn form() -> SessionForm {
        SessionForm {
            name: Some("Ownership".into()),
            speaker: Some("Ferris".into()),
            duration: Some(45),
            date: Some("2026-06-01".into()),
            start_time: Some("09:30".into()),
            ..SessionForm::default()
        }
    }

    #[test]
    fn defaults_and_lowercase_type() {
        let session = build_session(SessionForm {
            type_of_session: Some("Keynote".into()),
            ..form()
        })
        .unwrap();

        assert_eq!(session.type_of_session, "keynote");
        assert_eq!(session.highlights, DEFAULT_HIGHLIGHTS);
        assert_eq!(session.date, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        assert_eq!(session.start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());

        assert_eq!(build_session(form()).unwrap().type_of_session, "talk");
    }

    #[test]
    fn required_fields_are_reported_by_name() {
        let missing = |form: SessionForm| build_session(form).unwrap_err().to_string();

        assert_eq!(
            missing(SessionForm {
                speaker: None,
                ..form()
            }),
            "'speaker' field required"
        );
        assert_eq!(
            missing(SessionForm {
                start_time: Some(" ".into()),
                ..form()
            }),
            "'startTime' field required"
        );
    }

    #[test]
    fn malformed_time_is_rejected() {
        let err = build_session(SessionForm {
            start_time: Some("half past nine".into()),
            ..form()
        })
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_TIME");
    }

    #[tokio::test]
    async fn speaker_duration_query_needs_both_values() {
        let sessions = service();

        let err = sessions
            .sessions_by_speaker_within_duration("  ", 30)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "'speaker' field required");

        let err = sessions
            .sessions_by_speaker_within_duration("Ferris", 0)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "'duration' field required");

        assert!(
            sessions
                .sessions_by_speaker_within_duration("Ferris", 30)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn type_date_query_needs_both_values() {
        let sessions = service();

        let err = sessions
            .sessions_by_type_on_date("", "2026-06-01")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "'typeOfSession' field required");

        let err = sessions.sessions_by_type_on_date("talk", " ").await.unwrap_err();
        assert_eq!(err.code(), "MISSING_FIELD");
    }
}
