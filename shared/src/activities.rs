use crate::backend::{decode, decode_list, unique_id, Backend, Collection, Query, SessionToken};
use crate::error::BackendError;
use crate::outcome::Outcome;
use crate::types::{Activity, CreateActivityRequest, DocumentList, NewActivity, UpdateActivityRequest};
use chrono::{Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

pub const DEFAULT_LIST_LIMIT: u64 = 100;

/// Reason a new activity was rejected before reaching the backend
pub const MISSING_FIELDS: &str = "Açıklama ve tarih zorunludur";

/// Calendar dates (`YYYY-MM-DD`) become local midnight as UTC ISO-8601; anything else is kept.
pub fn normalize_date(date: &str) -> String {
    let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return date.to_string();
    };
    match Local.from_local_datetime(&day.and_time(NaiveTime::MIN)).earliest() {
        Some(start) => start
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        None => date.to_string(),
    }
}

impl CreateActivityRequest {
    /// Attach ownership; fails when description or date is blank
    pub fn into_new_activity(self, user_id: &str, user_name: &str) -> Result<NewActivity, &'static str> {
        if self.description.trim().is_empty() || self.date.trim().is_empty() {
            return Err(MISSING_FIELDS);
        }
        Ok(NewActivity {
            user_id: user_id.to_string(),
            user_name: Some(user_name.to_string()).filter(|n| !n.is_empty()),
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
            date: normalize_date(self.date.trim()),
        })
    }
}

pub async fn create_activity(backend: &dyn Backend, session: &SessionToken, activity: &NewActivity) -> Outcome<Activity> {
    let result = async {
        let data = serde_json::to_value(activity)?;
        let doc = backend
            .create_document(session, Collection::Activities, &unique_id(), data)
            .await?;
        decode::<Activity>(doc)
    }
    .await;
    Outcome::settle("Create activity", "Aktivite oluşturulamadı", result)
}

pub async fn get_activity(backend: &dyn Backend, session: &SessionToken, activity_id: &str) -> Outcome<Activity> {
    let result = async {
        let doc = backend
            .get_document(session, Collection::Activities, activity_id)
            .await?;
        decode::<Activity>(doc)
    }
    .await;
    Outcome::settle("Get activity", "Aktivite getirilemedi", result)
}

async fn list_with(
    backend: &dyn Backend,
    session: &SessionToken,
    queries: &[Query],
) -> Result<DocumentList<Activity>, BackendError> {
    let list = backend
        .list_documents(session, Collection::Activities, queries)
        .await?;
    decode_list(list)
}

/// Every user's activities, newest first (manager view)
pub async fn list_all_activities(
    backend: &dyn Backend,
    session: &SessionToken,
    limit: u64,
    offset: u64,
) -> Outcome<DocumentList<Activity>> {
    let queries = [Query::order_desc("date"), Query::limit(limit), Query::offset(offset)];
    Outcome::settle(
        "List all activities",
        "Aktiviteler getirilemedi",
        list_with(backend, session, &queries).await,
    )
}

pub async fn get_activity_by_user(
    backend: &dyn Backend,
    session: &SessionToken,
    user_id: &str,
    limit: u64,
) -> Outcome<DocumentList<Activity>> {
    let queries = [
        Query::equal("userId", user_id),
        Query::order_desc("date"),
        Query::limit(limit),
    ];
    Outcome::settle(
        "Get activity by user",
        "Aktiviteler getirilemedi",
        list_with(backend, session, &queries).await,
    )
}

/// Newest first, narrowed by caller supplied queries
pub async fn list_activities(
    backend: &dyn Backend,
    session: &SessionToken,
    queries: Vec<Query>,
) -> Outcome<DocumentList<Activity>> {
    let mut all = vec![Query::order_desc("date")];
    all.extend(queries);
    Outcome::settle(
        "List activities",
        "Aktiviteler getirilemedi",
        list_with(backend, session, &all).await,
    )
}

pub async fn delete_activity(backend: &dyn Backend, session: &SessionToken, activity_id: &str) -> Outcome<()> {
    Outcome::settle(
        "Delete activity",
        "Aktivite silinemedi",
        backend
            .delete_document(session, Collection::Activities, activity_id)
            .await,
    )
}

pub async fn update_activity(
    backend: &dyn Backend,
    session: &SessionToken,
    activity_id: &str,
    changes: &UpdateActivityRequest,
) -> Outcome<Activity> {
    let result = async {
        let data = serde_json::to_value(changes)?;
        let doc = backend
            .update_document(session, Collection::Activities, activity_id, data)
            .await?;
        decode::<Activity>(doc)
    }
    .await;
    Outcome::settle("Update activity", "Aktivite güncellenemedi", result)
}
