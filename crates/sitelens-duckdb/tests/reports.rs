use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sitelens_core::{
    analytics::{fetch_as, fetch_total, EventStore},
    event::Event,
    filter::parse_filters,
    funnel::{compute_funnel_results, FunnelDefinition, FunnelStep, StepKind},
    params::Bucket,
    reports::{BucketStats, EventRow, OverviewStats, SessionRow, UserRow},
    window::{BucketPlan, TimeWindow},
};
use sitelens_duckdb::queries::{
    funnel::{funnel_plan, step_counts},
    lists::{event_count_plan, event_list_plan, EventListKind},
    overview::overview_plan,
    sessions::{session_count_plan, session_list_plan},
    timeseries::bucketed_plan,
    users::{user_count_plan, user_list_plan},
    Page, ReportScope,
};
use sitelens_duckdb::DuckDbBackend;

const SITE: i64 = 7;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn window(from: u32, to: u32) -> TimeWindow {
    TimeWindow::new(date(from), date(to), chrono_tz::Tz::UTC)
}

fn scope(window: &TimeWindow) -> ReportScope<'_> {
    ReportScope {
        site_id: SITE,
        window,
        filter: None,
    }
}

fn step(value: &str, kind: StepKind) -> FunnelStep {
    FunnelStep {
        value: value.to_string(),
        name: None,
        kind,
        hostname: None,
    }
}

/// Three sessions over January 1st and 3rd, plus noise on another site.
async fn seeded() -> DuckDbBackend {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let mut landing = Event::pageview(SITE, "s1", "u1", "/landing", at(1, 10, 0));
    landing.country = Some("NZ".to_string());
    let events = vec![
        landing,
        Event::pageview(SITE, "s1", "u1", "/pricing", at(1, 10, 1)),
        Event::custom(SITE, "s1", "u1", "signup", at(1, 10, 5)),
        Event::pageview(SITE, "s2", "u2", "/pricing", at(1, 12, 0)),
        Event::custom(SITE, "s3", "u1", "signup", at(3, 9, 0)),
        Event::pageview(SITE, "s3", "u1", "/pricing", at(3, 9, 2)),
        Event::pageview(SITE + 1, "other", "u9", "/pricing", at(1, 11, 0)),
    ];
    db.insert_events(&events).await.expect("insert");
    db
}

#[tokio::test]
async fn overview_counts_sessions_pageviews_and_users() {
    let db = seeded().await;
    let w = window(1, 3);
    let stats: Vec<OverviewStats> = fetch_as(&db, &overview_plan(&scope(&w))).await.expect("overview");

    let stats = &stats[0];
    assert_eq!(stats.sessions, 3);
    assert_eq!(stats.pageviews, 4);
    assert_eq!(stats.users, 2);
    // s2 and s3 each have a single pageview.
    assert!((stats.bounce_rate - 0.6667).abs() < 1e-9);
}

#[tokio::test]
async fn daily_series_fills_empty_days_with_zeroes() {
    let db = seeded().await;
    let w = window(1, 3);
    let buckets = BucketPlan::new(&w, Bucket::Day, 1_000).expect("plan");
    let rows: Vec<BucketStats> = fetch_as(&db, &bucketed_plan(&scope(&w), &buckets))
        .await
        .expect("series");

    let times: Vec<&str> = rows.iter().map(|r| r.time.as_str()).collect();
    assert_eq!(
        times,
        [
            "2024-01-01T00:00:00.000Z",
            "2024-01-02T00:00:00.000Z",
            "2024-01-03T00:00:00.000Z"
        ]
    );
    assert_eq!(rows[0].stats.sessions, 2);
    assert_eq!(rows[0].stats.pageviews, 3);
    assert_eq!(rows[1].stats, OverviewStats::default());
    assert_eq!(rows[2].stats.sessions, 1);
}

#[tokio::test]
async fn funnel_requires_steps_in_order() {
    let db = seeded().await;
    let w = window(1, 3);
    let funnel = FunnelDefinition::new(vec![step("/pricing", StepKind::Page), step("signup", StepKind::Event)])
        .expect("funnel");

    let rows = db.fetch(&funnel_plan(&scope(&w), &funnel)).await.expect("funnel");
    let counts = step_counts(&rows, funnel.steps().len());
    // s3 signed up before visiting pricing, so it stops at step 1.
    assert_eq!(counts, vec![3, 1]);

    let results = compute_funnel_results(&funnel, &counts);
    assert_eq!(results[1].conversion_rate, 33.33);
    assert_eq!(results[1].dropoff_rate, 66.67);
}

#[tokio::test]
async fn event_lists_agree_with_their_counts() {
    let db = seeded().await;
    let w = window(1, 3);
    let s = scope(&w);
    let page = Page { limit: 2, offset: 0 };

    let pageviews: Vec<EventRow> = fetch_as(&db, &event_list_plan(&s, EventListKind::Pageviews, page))
        .await
        .expect("pageviews");
    assert_eq!(pageviews.len(), 2);
    assert_eq!(pageviews[0].pathname.as_deref(), Some("/pricing"));
    assert_eq!(pageviews[0].timestamp, "2024-01-03T09:02:00.000Z");
    let total = fetch_total(&db, &event_count_plan(&s, EventListKind::Pageviews))
        .await
        .expect("count");
    assert_eq!(total, 4);

    let signups = EventListKind::Events {
        event_name: Some("signup"),
    };
    let rows: Vec<EventRow> = fetch_as(&db, &event_list_plan(&s, signups, Page { limit: 10, offset: 0 }))
        .await
        .expect("events");
    assert_eq!(rows.len(), 2);
    assert_eq!(fetch_total(&db, &event_count_plan(&s, signups)).await.expect("count"), 2);
}

#[tokio::test]
async fn pages_do_not_overlap() {
    let db = seeded().await;
    let w = window(1, 3);
    let s = scope(&w);
    let mut seen = Vec::new();
    for offset in [0, 2, 4] {
        let rows: Vec<EventRow> = fetch_as(&db, &event_list_plan(&s, EventListKind::Events { event_name: None }, Page {
            limit: 2,
            offset,
        }))
        .await
        .expect("page");
        seen.extend(rows.into_iter().map(|r| r.timestamp));
    }
    assert_eq!(seen.len(), 6);
    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 6);
}

#[tokio::test]
async fn sessions_and_users_roll_up_events() {
    let db = seeded().await;
    let w = window(1, 3);
    let s = scope(&w);
    let page = Page { limit: 50, offset: 0 };

    let sessions: Vec<SessionRow> = fetch_as(&db, &session_list_plan(&s, page)).await.expect("sessions");
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0].session_id, "s3");
    let s1 = sessions.iter().find(|r| r.session_id == "s1").expect("s1");
    assert_eq!(s1.entry_page.as_deref(), Some("/landing"));
    assert_eq!(s1.exit_page.as_deref(), Some("/pricing"));
    assert_eq!(s1.events, 3);
    assert_eq!(s1.session_duration, 300);
    assert_eq!(fetch_total(&db, &session_count_plan(&s)).await.expect("count"), 3);

    let users: Vec<UserRow> = fetch_as(&db, &user_list_plan(&s, page)).await.expect("users");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].user_id, "u1");
    assert_eq!(users[0].sessions, 2);
    assert_eq!(fetch_total(&db, &user_count_plan(&s)).await.expect("count"), 2);
}

#[tokio::test]
async fn session_filters_keep_whole_sessions() {
    let db = seeded().await;
    let w = window(1, 3);
    let filter = parse_filters(r#"[{"parameter":"entry_page","type":"equals","value":["/landing"]}]"#)
        .expect("parse")
        .expect("filter");
    let s = ReportScope {
        site_id: SITE,
        window: &w,
        filter: Some(&filter),
    };

    let stats: Vec<OverviewStats> = fetch_as(&db, &overview_plan(&s)).await.expect("overview");
    assert_eq!(stats[0].sessions, 1);
    // Both pageviews of s1 survive, not only the entry page.
    assert_eq!(stats[0].pageviews, 2);
}

#[tokio::test]
async fn event_filters_narrow_rows() {
    let db = seeded().await;
    let w = window(1, 3);
    let filter = parse_filters(r#"[{"parameter":"country","type":"not_equals","value":["NZ"]}]"#)
        .expect("parse")
        .expect("filter");
    let s = ReportScope {
        site_id: SITE,
        window: &w,
        filter: Some(&filter),
    };
    let total = fetch_total(&db, &event_count_plan(&s, EventListKind::Pageviews))
        .await
        .expect("count");
    // NULL countries are kept by not_equals.
    assert_eq!(total, 3);
}

#[tokio::test]
async fn window_edges_follow_the_timezone() {
    let db = seeded().await;
    // 2024-01-01 in Auckland ends at 2024-01-01T11:00Z, so only the 10:00Z
    // and 10:01Z pageviews and the 10:05Z signup fall inside it.
    let w = TimeWindow::new(date(1), date(1), chrono_tz::Pacific::Auckland);
    let total = fetch_total(&db, &event_count_plan(&scope(&w), EventListKind::Events { event_name: None }))
        .await
        .expect("count");
    assert_eq!(total, 3);
}

#[tokio::test]
async fn hourly_series_spans_the_repeated_hour_on_fall_back() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let utc = |d: u32, h: u32, m: u32| Utc.with_ymd_and_hms(2024, 11, d, h, m, 0).unwrap();
    db.insert_events(&[
        // 01:30 EDT and 01:30 EST: same wall clock, different buckets.
        Event::pageview(SITE, "a", "u1", "/", utc(3, 5, 30)),
        Event::pageview(SITE, "b", "u2", "/", utc(3, 6, 30)),
        // 23:30 EST, the last hour of the local day.
        Event::pageview(SITE, "c", "u3", "/", utc(4, 4, 30)),
        // 00:30 EST on the 4th, outside the window.
        Event::pageview(SITE, "d", "u4", "/", utc(4, 5, 30)),
    ])
    .await
    .expect("insert");

    let day = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
    let w = TimeWindow::new(day, day, chrono_tz::America::New_York);
    let buckets = BucketPlan::new(&w, Bucket::Hour, 1_000).expect("plan");
    let rows: Vec<BucketStats> = fetch_as(&db, &bucketed_plan(&scope(&w), &buckets))
        .await
        .expect("series");

    assert_eq!(rows.len(), 25);
    assert_eq!(rows[0].time, "2024-11-03T04:00:00.000Z");
    assert_eq!(rows[24].time, "2024-11-04T04:00:00.000Z");
    assert!(rows.iter().all(|r| r.stats.pageviews <= 1));
    assert_eq!(rows[1].stats.pageviews, 1);
    assert_eq!(rows[2].stats.pageviews, 1);
    assert_eq!(rows[24].stats.pageviews, 1);
    let total: i64 = rows.iter().map(|r| r.stats.pageviews).sum();
    assert_eq!(total, 3);
    assert_eq!(
        fetch_total(&db, &event_count_plan(&scope(&w), EventListKind::Pageviews))
            .await
            .expect("count"),
        3
    );
}
