//! Week-level flows: merge, delete/revert, generation, copying and
//! optimistic concurrency.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Weekday};

use manege::allocation::ResourceAllocation;
use manege::availability::{AvailabilityWindow, WeekAvailability};
use manege::error::{EntityKind, ManegeError, StorageError};
use manege::schedule::{SessionOrigin, WeekRecord};
use manege::{
    EmbeddedScheduleStore, Person, RecurringTemplate, Resource, SchedulePlanner, ScheduleStore,
    Session, SessionInput,
};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

struct Fixture {
    planner: SchedulePlanner<EmbeddedScheduleStore>,
    store: Arc<EmbeddedScheduleStore>,
    alice: Person,
    tornado: Resource,
    template: RecurringTemplate,
}

/// Facility bookable 08:00-21:00 every day of the week.
fn open_week() -> WeekAvailability {
    let mut availability = WeekAvailability::new();
    for weekday in [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ] {
        availability
            .set_day(weekday, vec![AvailabilityWindow::new(t("08:00"), t("21:00"))])
            .unwrap();
    }
    availability
}

/// One rider on Tornado with a Tuesday 18:00 template, facility open all week.
async fn fixture() -> Fixture {
    let store = Arc::new(EmbeddedScheduleStore::new());
    let alice = Person::new("Alice");
    let tornado = Resource::new("Tornado");
    let template = RecurringTemplate::new(Weekday::Tue, t("18:00"), 60)
        .with_persons([alice.id.clone()])
        .with_instructor("Laura");

    store.upsert_person(alice.clone()).await.unwrap();
    store.upsert_resource(tornado.clone()).await.unwrap();
    store.upsert_template(template.clone()).await.unwrap();
    store.save_availability(open_week()).await.unwrap();
    store
        .save_allocations(vec![ResourceAllocation::new(
            alice.id.clone(),
            tornado.id.clone(),
            d("2024-01-01"),
            2.0,
        )])
        .await
        .unwrap();

    Fixture {
        planner: SchedulePlanner::new(Arc::clone(&store)),
        store,
        alice,
        tornado,
        template,
    }
}

#[tokio::test]
async fn test_merged_week_shows_generated_drafts() {
    let fx = fixture().await;
    let sessions = fx.planner.merged_week("2024-06-10").await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].origin, SessionOrigin::Generated);
    assert_eq!(sessions[0].date, d("2024-06-11"));
    assert_eq!(sessions[0].instructor, "Laura");
    assert!(sessions[0].resource_ids.is_empty());
}

#[tokio::test]
async fn test_override_then_delete_reverts_to_generated() {
    let fx = fixture().await;

    // Move the Tuesday lesson to 19:00 for this week only.
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "19:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(fx.template.id.clone()),
        )
        .await
        .unwrap();

    let sessions = fx.planner.merged_week("2024-06-10").await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].origin, SessionOrigin::Modified);
    assert_eq!(sessions[0].start_time, t("19:00"));

    // Next week is untouched.
    let next = fx.planner.merged_week("2024-06-17").await.unwrap();
    assert_eq!(next[0].origin, SessionOrigin::Generated);
    assert_eq!(next[0].start_time, t("18:00"));

    // Deleting the override restores the generated draft.
    fx.planner.delete_session("2024-06-11", "19:00").await.unwrap();
    let sessions = fx.planner.merged_week("2024-06-10").await.unwrap();
    assert_eq!(sessions[0].origin, SessionOrigin::Generated);
    assert_eq!(sessions[0].start_time, t("18:00"));
}

#[tokio::test]
async fn test_deleting_generated_draft_is_not_found() {
    let fx = fixture().await;
    let err = fx
        .planner
        .delete_session("2024-06-11", "18:00")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManegeError::NotFound {
            kind: EntityKind::Session,
            ..
        }
    ));
}

#[tokio::test]
async fn test_delete_punctual_session() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-12", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();
    assert_eq!(fx.planner.merged_week("2024-06-10").await.unwrap().len(), 2);

    fx.planner.delete_session("2024-06-12", "10:00").await.unwrap();
    assert_eq!(fx.planner.merged_week("2024-06-10").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_generate_week_materializes_drafts() {
    let fx = fixture().await;
    let outcome = fx.planner.generate_week("2024-06-10", false).await.unwrap();
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.skipped, 0);
    assert!(outcome.errors.is_empty());

    // The materialized draft carries the allocation-resolved resource.
    let sessions = fx.planner.merged_week("2024-06-10").await.unwrap();
    assert_eq!(sessions[0].origin, SessionOrigin::Modified);
    assert_eq!(sessions[0].resource_ids, vec![fx.tornado.id.clone()]);
    assert_eq!(sessions[0].auto_added_resource_ids, vec![fx.tornado.id]);

    // A second run without overwrite skips everything.
    let outcome = fx.planner.generate_week("2024-06-10", false).await.unwrap();
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn test_generate_week_without_active_templates_fails() {
    let store = Arc::new(EmbeddedScheduleStore::new());
    let planner = SchedulePlanner::new(Arc::clone(&store));
    let err = planner.generate_week("2024-06-10", false).await.unwrap_err();
    assert!(matches!(err, ManegeError::Validation(_)));
}

#[tokio::test]
async fn test_copy_week_shifts_entries() {
    let fx = fixture().await;

    // One punctual session plus a template override in the source week.
    let punctual = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-12", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "19:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(fx.template.id.clone()),
        )
        .await
        .unwrap();

    let outcome = fx
        .planner
        .copy_week("2024-06-10", "2024-06-17", false)
        .await
        .unwrap();
    assert_eq!(outcome.copied, 2);
    assert_eq!(outcome.skipped, 0);
    assert!(outcome.errors.is_empty());

    let sessions = fx.planner.merged_week("2024-06-17").await.unwrap();
    assert_eq!(sessions.len(), 2);

    // The override followed the template to next Tuesday.
    let modified: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.origin == SessionOrigin::Modified)
        .collect();
    assert_eq!(modified.len(), 1);
    assert_eq!(modified[0].date, d("2024-06-18"));
    assert_eq!(modified[0].start_time, t("19:00"));

    // The punctual copy moved a week and got a fresh identity.
    let copied: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.origin == SessionOrigin::Punctual)
        .collect();
    assert_eq!(copied.len(), 1);
    assert_eq!(copied[0].date, d("2024-06-19"));
    assert_ne!(copied[0].id, punctual.id);
    assert_eq!(copied[0].person_ids, punctual.person_ids);
}

#[tokio::test]
async fn test_copy_week_skip_and_overwrite() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-12", "10:00", 60)
                .with_persons([fx.alice.id.clone()])
                .with_resources([fx.tornado.id.clone()]),
        )
        .await
        .unwrap();

    // Destination already has a session in the colliding slot.
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-19", "10:00", 30).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    let outcome = fx
        .planner
        .copy_week("2024-06-10", "2024-06-17", false)
        .await
        .unwrap();
    assert_eq!(outcome.copied, 0);
    assert_eq!(outcome.skipped, 1);

    let outcome = fx
        .planner
        .copy_week("2024-06-10", "2024-06-17", true)
        .await
        .unwrap();
    assert_eq!(outcome.copied, 1);

    let sessions = fx.planner.merged_week("2024-06-17").await.unwrap();
    let punctual: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.origin == SessionOrigin::Punctual)
        .collect();
    assert_eq!(punctual.len(), 1);
    assert_eq!(punctual[0].duration_minutes, 60);
}

#[tokio::test]
async fn test_copy_week_rejects_identity_and_empty_source() {
    let fx = fixture().await;
    let err = fx
        .planner
        .copy_week("2024-06-10", "2024-06-14", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Validation(_)));

    let err = fx
        .planner
        .copy_week("2024-06-10", "2024-06-17", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Validation(_)));
}

#[tokio::test]
async fn test_concurrent_week_write_is_detected() {
    let fx = fixture().await;
    let versioned = fx.store.get_week_record("2024-24").await.unwrap();

    // Another writer lands first.
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-12", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    let err = fx
        .store
        .compare_and_swap_week("2024-24", versioned.version, WeekRecord::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManegeError::Storage(StorageError::VersionConflict { .. })
    ));
}

#[tokio::test]
async fn test_week_stats_over_merged_week() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-12", "10:00", 90)
                .with_persons([fx.alice.id.clone()])
                .with_resources([fx.tornado.id.clone()]),
        )
        .await
        .unwrap();

    let stats = fx.planner.week_stats("2024-06-12").await.unwrap();
    assert_eq!(stats.week_start, d("2024-06-10"));
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.from_template, 1);
    assert_eq!(stats.unique_persons, 1);
    assert_eq!(stats.total_hours, 2.5);
    assert_eq!(stats.sessions_per_weekday["tuesday"], 1);
    assert_eq!(stats.sessions_per_weekday["wednesday"], 1);
}

#[tokio::test]
async fn test_punctual_at_draft_slot_conflicts() {
    let fx = fixture().await;

    // The Tuesday 18:00 draft already books Alice; a punctual session at
    // the very same time must not slip past conflict detection.
    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "18:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Conflict(_)));

    let conflicts = fx.planner.list_conflicts("2024-06-10").await.unwrap();
    assert!(conflicts.is_empty());
    assert_eq!(fx.planner.merged_week("2024-06-10").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_generate_respects_availability() {
    let fx = fixture().await;

    // Facility only open Tuesday mornings; the 18:00 template cannot land.
    let mut availability = WeekAvailability::new();
    availability
        .set_day(
            Weekday::Tue,
            vec![AvailabilityWindow::new(t("09:00"), t("12:00"))],
        )
        .unwrap();
    fx.store.save_availability(availability).await.unwrap();

    let outcome = fx.planner.generate_week("2024-06-10", false).await.unwrap();
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.errors.len(), 1);

    // Nothing was materialized into the stored week.
    let sessions = fx.planner.merged_week("2024-06-10").await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].origin, SessionOrigin::Generated);
}

#[tokio::test]
async fn test_generate_sees_existing_overrides() {
    let fx = fixture().await;

    // Move the Tuesday lesson to 19:00, then add a second template whose
    // draft would collide with the moved session.
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "19:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(fx.template.id.clone()),
        )
        .await
        .unwrap();
    let second = RecurringTemplate::new(Weekday::Tue, t("19:30"), 60)
        .with_persons([fx.alice.id.clone()]);
    fx.store.upsert_template(second).await.unwrap();

    let outcome = fx.planner.generate_week("2024-06-10", false).await.unwrap();
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.errors.len(), 1);

    // The stored week stays conflict-free.
    let conflicts = fx.planner.list_conflicts("2024-06-10").await.unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn test_override_of_inactive_template_rejected() {
    let fx = fixture().await;
    assert!(fx
        .store
        .deactivate_template(&fx.template.id)
        .await
        .unwrap());

    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "19:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(fx.template.id.clone()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Validation(_)));
    assert!(fx.planner.merged_week("2024-06-10").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_accepted_operations_never_store_conflicts() {
    let fx = fixture().await;

    // Override the template, generate the rest of the week, add a punctual
    // session, and bounce a colliding attempt off the conflict gate.
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "19:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(fx.template.id.clone()),
        )
        .await
        .unwrap();
    fx.planner.generate_week("2024-06-10", false).await.unwrap();
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-13", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();
    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-13", "10:30", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Conflict(_)));

    // After any accepted batch, the stored week holds no double-booking.
    let conflicts = fx.planner.list_conflicts("2024-06-10").await.unwrap();
    assert!(conflicts.is_empty());
    assert_eq!(fx.planner.merged_week("2024-06-10").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_deactivated_template_drops_from_merge() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "19:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(fx.template.id.clone()),
        )
        .await
        .unwrap();

    assert!(fx
        .store
        .deactivate_template(&fx.template.id)
        .await
        .unwrap());

    // The draft is gone and the orphaned override goes with it.
    let sessions = fx.planner.merged_week("2024-06-10").await.unwrap();
    assert!(sessions.is_empty());

    let conflicts = fx.planner.list_conflicts("2024-06-10").await.unwrap();
    assert!(conflicts.is_empty());
}
