use crate::backend::{decode_list, Backend, Collection, Query, SessionToken};
use crate::error::BackendError;
use crate::outcome::Outcome;
use crate::types::{Activity, CategoryDistribution, DashboardStats, MostActiveIntern};
use chrono::{DateTime, Duration, Local, LocalResult, NaiveTime, Offset, SecondsFormat, TimeZone, Utc};
use std::collections::{HashMap, HashSet};

const SCAN_PAGE_SIZE: u64 = 100;
pub const UNCATEGORIZED: &str = "Diğer";
pub const UNKNOWN_USER: &str = "Bilinmeyen";
pub const NOBODY_YET: &str = "Henüz yok";

/// Activities read by a capped, paginated scan
#[derive(Debug, Clone)]
pub struct Scan {
    pub activities: Vec<Activity>,
    pub total: u64,
    pub truncated: bool,
}

/// Page through activities matching `filters`, stopping after `cap` documents.
pub async fn scan_activities(
    backend: &dyn Backend,
    session: &SessionToken,
    filters: &[Query],
    cap: usize,
) -> Result<Scan, BackendError> {
    let mut activities: Vec<Activity> = Vec::new();
    let mut total = 0;

    loop {
        let remaining = cap.saturating_sub(activities.len()) as u64;
        if remaining == 0 {
            break;
        }
        let mut queries = filters.to_vec();
        queries.push(Query::order_asc("$createdAt"));
        queries.push(Query::limit(remaining.min(SCAN_PAGE_SIZE)));
        queries.push(Query::offset(activities.len() as u64));

        let page = decode_list::<Activity>(
            backend
                .list_documents(session, Collection::Activities, &queries)
                .await?,
        )?;
        total = page.total;
        let fetched = page.documents.len();
        activities.extend(page.documents);

        if fetched == 0 || activities.len() as u64 >= total {
            break;
        }
    }

    let truncated = total > activities.len() as u64;
    if truncated {
        tracing::warn!(
            "Activity scan stopped at {} of {} documents (STATS_SCAN_LIMIT)",
            activities.len(),
            total
        );
    }
    Ok(Scan {
        activities,
        total,
        truncated,
    })
}

/// Count activities per user; ties go to the user seen first.
pub fn most_active_intern(activities: &[Activity]) -> MostActiveIntern {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, (u64, &str)> = HashMap::new();

    for activity in activities {
        let user_name = activity
            .user_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_USER);
        let entry = counts.entry(activity.user_id.as_str()).or_insert_with(|| {
            order.push(activity.user_id.as_str());
            (0, user_name)
        });
        entry.0 += 1;
    }

    let mut best = MostActiveIntern {
        user_id: String::new(),
        user_name: NOBODY_YET.to_string(),
        count: 0,
    };
    for user_id in order {
        let (count, user_name) = counts[user_id];
        if count > best.count {
            best = MostActiveIntern {
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
                count,
            };
        }
    }
    best
}

/// Activities per category; blank categories count under "Diğer".
pub fn category_distribution(activities: &[Activity]) -> CategoryDistribution {
    let mut distribution = CategoryDistribution::new();
    for activity in activities {
        let category = activity
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED);
        *distribution.entry(category.to_string()).or_insert(0) += 1;
    }
    distribution
}

/// Local midnight of `now`'s day, as a UTC ISO-8601 timestamp
pub fn start_of_local_day<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = match now.timezone().from_local_datetime(&midnight) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Midnight skipped by a DST jump: the day starts where the gap does,
        // which is midnight under the offset in force before the jump
        LocalResult::None => {
            let before = now
                .timezone()
                .offset_from_local_datetime(&(midnight - Duration::hours(1)))
                .earliest()
                .map(|offset| offset.fix())
                .unwrap_or_else(|| now.offset().fix());
            Utc.from_utc_datetime(&(midnight - before))
        }
    };
    start.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn get_today_active_interns(
    backend: &dyn Backend,
    session: &SessionToken,
    now: DateTime<Local>,
    cap: usize,
) -> Outcome<u64> {
    let filters = [Query::greater_than_equal("date", start_of_local_day(&now))];
    let result = scan_activities(backend, session, &filters, cap)
        .await
        .map(|scan| {
            let users: HashSet<&str> = scan.activities.iter().map(|a| a.user_id.as_str()).collect();
            users.len() as u64
        });
    Outcome::settle(
        "Get today active interns",
        "Aktif stajyer sayısı getirilemedi",
        result,
    )
}

pub async fn get_total_activities(backend: &dyn Backend, session: &SessionToken) -> Outcome<u64> {
    let result = backend
        .list_documents(session, Collection::Activities, &[Query::limit(1)])
        .await
        .map(|list| list.total);
    Outcome::settle("Get total activities", "Aktivite sayısı getirilemedi", result)
}

pub async fn get_most_active_intern(backend: &dyn Backend, session: &SessionToken, cap: usize) -> Outcome<MostActiveIntern> {
    let result = scan_activities(backend, session, &[], cap)
        .await
        .map(|scan| most_active_intern(&scan.activities));
    Outcome::settle("Get most active intern", "En aktif stajyer getirilemedi", result)
}

pub async fn get_category_distribution(
    backend: &dyn Backend,
    session: &SessionToken,
    cap: usize,
) -> Outcome<CategoryDistribution> {
    let result = scan_activities(backend, session, &[], cap)
        .await
        .map(|scan| category_distribution(&scan.activities));
    Outcome::settle(
        "Get category distribution",
        "Kategori dağılımı getirilemedi",
        result,
    )
}

/// All dashboard figures. The activity scan is shared by the two reducers.
pub async fn dashboard_stats(
    backend: &dyn Backend,
    session: &SessionToken,
    now: DateTime<Local>,
    cap: usize,
) -> DashboardStats {
    let (total_interns, today_active, total_activities, scan) = tokio::join!(
        crate::users::get_total_interns(backend, session),
        get_today_active_interns(backend, session, now, cap),
        get_total_activities(backend, session),
        scan_activities(backend, session, &[], cap),
    );

    let mut stats = DashboardStats {
        total_interns: total_interns.data(),
        today_active_interns: today_active.data(),
        total_activities: total_activities.data(),
        ..Default::default()
    };
    match scan {
        Ok(scan) => {
            stats.most_active_intern = Some(most_active_intern(&scan.activities));
            stats.category_distribution = Some(category_distribution(&scan.activities));
            stats.truncated = scan.truncated;
        }
        Err(e) => tracing::error!("Dashboard activity scan error: {}", e),
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
    use serde_json::json;

    /// +02:00 until 2026-03-28T22:00Z, then +03:00; local 00:00-01:00 on
    /// 2026-03-29 does not exist
    #[derive(Debug, Clone, Copy)]
    struct SpringForward;

    impl SpringForward {
        fn cutover() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2026, 3, 28).unwrap().and_hms_opt(22, 0, 0).unwrap()
        }
        fn winter() -> FixedOffset {
            FixedOffset::east_opt(2 * 3600).unwrap()
        }
        fn summer() -> FixedOffset {
            FixedOffset::east_opt(3 * 3600).unwrap()
        }
    }

    impl TimeZone for SpringForward {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            SpringForward
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let winter = *local - Self::winter() < Self::cutover();
            let summer = *local - Self::summer() >= Self::cutover();
            match (winter, summer) {
                (true, true) => LocalResult::Ambiguous(Self::winter(), Self::summer()),
                (true, false) => LocalResult::Single(Self::winter()),
                (false, true) => LocalResult::Single(Self::summer()),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::cutover() {
                Self::winter()
            } else {
                Self::summer()
            }
        }
    }

    fn activity(user_id: &str, user_name: Option<&str>, category: Option<&str>) -> Activity {
        Activity {
            id: crate::backend::unique_id(),
            user_id: user_id.to_string(),
            user_name: user_name.map(|s| s.to_string()),
            category: category.map(|s| s.to_string()),
            description: "iş".to_string(),
            date: "2026-10-19T09:00:00.000Z".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_category_distribution_defaults_missing_category() {
        let activities = vec![
            activity("u1", None, Some("A")),
            activity("u1", None, Some("A")),
            activity("u2", None, None),
        ];
        let distribution = category_distribution(&activities);
        assert_eq!(distribution.len(), 2);
        assert_eq!(distribution["A"], 2);
        assert_eq!(distribution["Diğer"], 1);

        let empty_string = vec![activity("u1", None, Some(""))];
        assert_eq!(category_distribution(&empty_string)["Diğer"], 1);
    }

    #[test]
    fn test_most_active_intern() {
        assert_eq!(
            most_active_intern(&[]),
            MostActiveIntern {
                user_id: String::new(),
                user_name: "Henüz yok".to_string(),
                count: 0
            }
        );

        let activities = vec![
            activity("u1", Some("Ayşe"), None),
            activity("u2", None, None),
            activity("u2", Some("Mehmet"), None),
            activity("u1", Some("Ayşe"), None),
            activity("u2", Some("Mehmet"), None),
        ];
        let best = most_active_intern(&activities);
        assert_eq!(best.user_id, "u2");
        assert_eq!(best.count, 3);
        // Name comes from the first activity seen for that user
        assert_eq!(best.user_name, "Bilinmeyen");
    }

    #[test]
    fn test_most_active_tie_goes_to_first_seen() {
        let activities = vec![
            activity("u1", Some("Ayşe"), None),
            activity("u2", Some("Mehmet"), None),
        ];
        assert_eq!(most_active_intern(&activities).user_id, "u1");
    }

    #[test]
    fn test_start_of_local_day() {
        let istanbul = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = istanbul.with_ymd_and_hms(2026, 10, 19, 14, 30, 0).unwrap();
        assert_eq!(start_of_local_day(&now), "2026-10-18T21:00:00.000Z");

        let just_after = istanbul.with_ymd_and_hms(2026, 10, 19, 0, 0, 1).unwrap();
        assert_eq!(start_of_local_day(&just_after), "2026-10-18T21:00:00.000Z");
    }

    #[test]
    fn test_start_of_day_skipped_midnight() {
        let utc = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let now = SpringForward.from_utc_datetime(&utc);
        // Local 01:00 (+03:00), the first instant that exists that day
        assert_eq!(start_of_local_day(&now), "2026-03-28T22:00:00.000Z");
    }

    #[tokio::test]
    async fn test_scan_pages_and_reports_truncation() {
        let backend = MemoryBackend::new();
        let token = backend.seed_session("m1");
        for i in 0..250 {
            backend.seed_document(
                Collection::Activities,
                json!({"userId": format!("u{}", i % 7), "category": "A", "description": "x", "date": "2026-10-19T09:00:00.000Z"}),
            );
        }

        let full = scan_activities(&backend, &token, &[], 1000).await.unwrap();
        assert_eq!(full.activities.len(), 250);
        assert_eq!(full.total, 250);
        assert!(!full.truncated);

        let capped = scan_activities(&backend, &token, &[], 120).await.unwrap();
        assert_eq!(capped.activities.len(), 120);
        assert!(capped.truncated);
    }

    #[tokio::test]
    async fn test_today_active_counts_distinct_users_since_midnight() {
        let backend = MemoryBackend::new();
        let token = backend.seed_session("m1");
        let now = Local::now();
        let today = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let long_ago = "2020-01-01T09:00:00.000Z";
        for (user, date) in [("u1", today.as_str()), ("u1", today.as_str()), ("u2", today.as_str()), ("u3", long_ago)] {
            backend.seed_document(
                Collection::Activities,
                json!({"userId": user, "category": "A", "description": "x", "date": date}),
            );
        }

        assert_eq!(
            get_today_active_interns(&backend, &token, now, 1000).await,
            Outcome::Success(2)
        );
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let backend = MemoryBackend::new();
        let token = backend.seed_session("m1");
        backend.seed_document(Collection::Users, json!({"userId": "u1", "name": "Ayşe", "email": "a@x", "role": "stajyer"}));
        backend.seed_document(Collection::Users, json!({"userId": "m1", "name": "Mert", "email": "m@x", "role": "yonetici"}));
        for category in ["A", "A", "B"] {
            backend.seed_document(
                Collection::Activities,
                json!({"userId": "u1", "userName": "Ayşe", "category": category, "description": "x", "date": "2020-01-01T09:00:00.000Z"}),
            );
        }

        let stats = dashboard_stats(&backend, &token, Local::now(), 1000).await;
        assert_eq!(stats.total_interns, Some(1));
        assert_eq!(stats.today_active_interns, Some(0));
        assert_eq!(stats.total_activities, Some(3));
        assert_eq!(stats.most_active_intern.unwrap().user_name, "Ayşe");
        assert_eq!(stats.category_distribution.unwrap()["A"], 2);
        assert!(!stats.truncated);
    }
}
