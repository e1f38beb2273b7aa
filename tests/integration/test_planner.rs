//! Planner behavior: session upserts, auto resource assignment,
//! availability gating and conflict rejection.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Weekday};

use manege::allocation::ResourceAllocation;
use manege::availability::{AvailabilityWindow, WeekAvailability};
use manege::error::{AvailabilityError, ManegeError};
use manege::schedule::SessionOrigin;
use manege::{
    EmbeddedScheduleStore, Person, RecurringTemplate, Resource, SchedulePlanner, ScheduleStore,
    SessionInput,
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
    bob: Person,
    tornado: Resource,
    luna: Resource,
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

/// Two riders, two horses, Tornado allocated to Alice since 2024-01-01,
/// facility open all week.
async fn fixture() -> Fixture {
    let store = Arc::new(EmbeddedScheduleStore::new());
    let alice = Person::new("Alice");
    let bob = Person::new("Bob");
    let tornado = Resource::new("Tornado");
    let luna = Resource::new("Luna").house();

    store.upsert_person(alice.clone()).await.unwrap();
    store.upsert_person(bob.clone()).await.unwrap();
    store.upsert_resource(tornado.clone()).await.unwrap();
    store.upsert_resource(luna.clone()).await.unwrap();
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
        bob,
        tornado,
        luna,
    }
}

#[tokio::test]
async fn test_punctual_session_gets_allocated_resource() {
    let fx = fixture().await;
    let session = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    assert_eq!(session.origin, SessionOrigin::Punctual);
    assert_eq!(session.resource_ids, vec![fx.tornado.id.clone()]);
    assert_eq!(session.auto_added_resource_ids, vec![fx.tornado.id]);
    assert_eq!(session.key(), "2024-06-11|10:00");
}

#[tokio::test]
async fn test_explicit_resources_come_before_auto_added() {
    let fx = fixture().await;
    let session = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60)
                .with_persons([fx.alice.id.clone()])
                .with_resources([fx.luna.id.clone()]),
        )
        .await
        .unwrap();

    assert_eq!(session.resource_ids, vec![fx.luna.id, fx.tornado.id.clone()]);
    assert_eq!(session.auto_added_resource_ids, vec![fx.tornado.id]);
}

#[tokio::test]
async fn test_editing_punctual_slot_keeps_identity() {
    let fx = fixture().await;
    let input = SessionInput::new("2024-06-11", "10:00", 60).with_persons([fx.alice.id.clone()]);
    let first = fx.planner.create_or_update_session(input.clone()).await.unwrap();

    let mut edited = input;
    edited.duration_minutes = 45;
    let second = fx.planner.create_or_update_session(edited).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.duration_minutes, 45);
}

#[tokio::test]
async fn test_unknown_person_is_rejected() {
    let fx = fixture().await;
    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60).with_persons(["ghost"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::NotFound { .. }));
}

#[tokio::test]
async fn test_session_requires_a_person() {
    let fx = fixture().await;
    let err = fx
        .planner
        .create_or_update_session(SessionInput::new("2024-06-11", "10:00", 60))
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Validation(_)));
}

#[tokio::test]
async fn test_duration_bounds_enforced() {
    let fx = fixture().await;
    for duration in [0, 481] {
        let err = fx
            .planner
            .create_or_update_session(
                SessionInput::new("2024-06-11", "10:00", duration)
                    .with_persons([fx.alice.id.clone()]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ManegeError::Validation(_)));
    }
}

#[tokio::test]
async fn test_shared_person_overlap_is_rejected() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:30", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Conflict(_)));
}

#[tokio::test]
async fn test_disjoint_participants_may_overlap() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    // Bob rides Luna at the same time; nothing is shared.
    let session = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:30", 60)
                .with_persons([fx.bob.id.clone()])
                .with_resources([fx.luna.id.clone()]),
        )
        .await
        .unwrap();
    assert_eq!(session.person_ids, vec![fx.bob.id]);
}

#[tokio::test]
async fn test_back_to_back_sessions_allowed() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "11:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_availability_window_gates_the_slot() {
    let fx = fixture().await;
    let mut availability = WeekAvailability::new();
    availability
        .set_day(
            Weekday::Tue,
            vec![
                AvailabilityWindow::new(t("09:00"), t("12:00")),
                AvailabilityWindow::new(t("14:00"), t("18:00")),
            ],
        )
        .unwrap();
    fx.store.save_availability(availability).await.unwrap();

    // 2024-06-11 is a Tuesday. 10:00+60 fits the morning window.
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    // 11:30+90 crosses the window boundary and is rejected.
    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "11:30", 90).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManegeError::Availability(AvailabilityError::OutsideWindows { .. })
    ));

    // Wednesday has no windows configured; every rider is gated alike.
    for person in [fx.alice.id.clone(), fx.bob.id.clone()] {
        let err = fx
            .planner
            .create_or_update_session(
                SessionInput::new("2024-06-12", "10:00", 60).with_persons([person]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ManegeError::Availability(AvailabilityError::NoWindows { .. })
        ));
    }
}

#[tokio::test]
async fn test_unconfigured_calendar_rejects_all_slots() {
    let fx = fixture().await;
    fx.store
        .save_availability(WeekAvailability::new())
        .await
        .unwrap();

    // With zero windows configured anywhere, nothing is bookable.
    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "03:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManegeError::Availability(AvailabilityError::NoWindows { .. })
    ));
    assert!(fx.planner.merged_week("2024-06-10").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_template_override_lands_on_template_weekday() {
    let fx = fixture().await;
    let template = RecurringTemplate::new(Weekday::Tue, t("18:00"), 60)
        .with_persons([fx.alice.id.clone()]);
    fx.store.upsert_template(template.clone()).await.unwrap();

    // Wednesday date for a Tuesday template.
    let err = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-12", "18:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(template.id.clone()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ManegeError::Validation(_)));

    let session = fx
        .planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "19:00", 60)
                .with_persons([fx.alice.id.clone()])
                .for_template(template.id.clone()),
        )
        .await
        .unwrap();
    assert_eq!(session.origin, SessionOrigin::Modified);
    assert_eq!(session.id, format!("rec_{}_2024-06-11", template.id));
}

#[tokio::test]
async fn test_check_availability_reports_occupancy() {
    let fx = fixture().await;
    fx.planner
        .create_or_update_session(
            SessionInput::new("2024-06-11", "10:00", 60).with_persons([fx.alice.id.clone()]),
        )
        .await
        .unwrap();

    let slot = fx
        .planner
        .check_availability_at("2024-06-11", "10:30", 60, None)
        .await
        .unwrap();
    assert_eq!(slot.occupied_person_ids, vec![fx.alice.id.clone()]);
    assert_eq!(slot.occupied_resource_ids, vec![fx.tornado.id.clone()]);
    assert_eq!(slot.available_persons.len(), 1);
    assert_eq!(slot.available_persons[0].person_id, fx.bob.id);
    assert_eq!(slot.available_resource_ids, vec![fx.luna.id.clone()]);

    // A free afternoon slot sees everyone, and Alice's allocation resolves.
    let slot = fx
        .planner
        .check_availability_at("2024-06-11", "15:00", 60, None)
        .await
        .unwrap();
    assert!(slot.occupied_person_ids.is_empty());
    assert_eq!(slot.available_persons.len(), 2);
    let alice_entry = slot
        .available_persons
        .iter()
        .find(|p| p.person_id == fx.alice.id)
        .unwrap();
    assert_eq!(alice_entry.allocated_resource_ids, vec![fx.tornado.id]);
}
