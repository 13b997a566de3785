use lift_core::model::{
    ExerciseId, ExerciseSummary, PersonalRecord, PlanId, PlannedExercise, PlannedSet,
    RecordCategory, SessionId, SessionStatus, UserId, WorkoutPlan, WorkoutSession,
};
use lift_core::time::fixed_now;
use lift_core::workout::{SessionCursor, SessionRules, SetPerformance, machine};
use storage::repository::{
    ExerciseCatalog, PersonalRecordRepository, Storage, StorageError, WorkoutSessionRepository,
};
use storage::sqlite::SqliteRepository;

fn push_day(user: u64) -> WorkoutSession {
    let plan = WorkoutPlan::new(
        PlanId::new(3),
        "Push",
        vec![
            PlannedExercise::new(
                ExerciseId::new(10),
                "Bench Press",
                90,
                vec![PlannedSet::new(60.0, 8), PlannedSet::new(60.0, 8)],
            ),
            PlannedExercise::new(
                ExerciseId::new(11),
                "Overhead Press",
                60,
                vec![PlannedSet::new(40.0, 10)],
            ),
        ],
    );
    WorkoutSession::from_plan(SessionId::generate(), UserId::new(user), &plan, fixed_now())
        .unwrap()
}

async fn open(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_keeps_executed_sets_and_rest_window() {
    let repo = open("memdb_session_roundtrip").await;

    let session = push_day(1);
    let started = machine::start(&session, fixed_now()).unwrap();
    let step = machine::complete_set(
        &started.session,
        &started.cursor,
        &SetPerformance::new(62.5, 8).with_effort(8),
        fixed_now(),
        &SessionRules::default(),
    )
    .unwrap();
    repo.put_session(&step.session).await.unwrap();

    let fetched = repo.get_session(session.id()).await.unwrap();
    assert_eq!(fetched, step.session);
    assert_eq!(fetched.status(), SessionStatus::Resting);
    assert_eq!(fetched.rest().map(|r| r.duration_ms), Some(90_000));
    assert_eq!(fetched.total_volume(), 500.0);

    let cursor = SessionCursor::restore(&fetched);
    assert_eq!((cursor.exercise_index, cursor.set_index), (0, 0));
}

#[tokio::test]
async fn sqlite_missing_session_is_not_found() {
    let repo = open("memdb_session_missing").await;
    let err = repo.get_session(SessionId::generate()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_active_session_follows_status_column() {
    let repo = open("memdb_session_active").await;
    let session = push_day(7);
    repo.put_session(&session).await.unwrap();
    assert!(repo.active_session_for_user(UserId::new(7)).await.unwrap().is_none());

    let started = machine::start(&session, fixed_now()).unwrap();
    repo.put_session(&started.session).await.unwrap();
    let active = repo.active_session_for_user(UserId::new(7)).await.unwrap();
    assert_eq!(active.map(|s| s.id()), Some(session.id()));

    let done = machine::finish(
        &started.session,
        &started.cursor,
        SessionStatus::Abandoned,
        fixed_now(),
    )
    .unwrap();
    repo.put_session(&done.session).await.unwrap();
    assert!(repo.active_session_for_user(UserId::new(7)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_refuses_a_second_active_session_per_user() {
    let repo = open("memdb_session_one_active").await;
    let first = machine::start(&push_day(4), fixed_now()).unwrap();
    repo.put_session(&first.session).await.unwrap();

    let second = push_day(4);
    repo.put_session(&second).await.unwrap();
    let second_running = machine::start(&second, fixed_now()).unwrap();
    let err = repo.put_session(&second_running.session).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert_eq!(
        repo.get_session(second.id()).await.unwrap().status(),
        SessionStatus::NotStarted
    );

    // Once the first one ends, the second may start.
    let done = machine::finish(
        &first.session,
        &first.cursor,
        SessionStatus::Completed,
        fixed_now(),
    )
    .unwrap();
    repo.put_session(&done.session).await.unwrap();
    repo.put_session(&second_running.session).await.unwrap();
    let active = repo.active_session_for_user(UserId::new(4)).await.unwrap();
    assert_eq!(active.map(|s| s.id()), Some(second.id()));
}

#[tokio::test]
async fn sqlite_subscription_sees_every_write() {
    let repo = open("memdb_session_feed").await;
    let session = push_day(2);
    repo.put_session(&session).await.unwrap();

    let mut sub = repo.subscribe_session(session.id()).await.unwrap();
    assert_eq!(sub.next().await.unwrap().status(), SessionStatus::NotStarted);

    let started = machine::start(&session, fixed_now()).unwrap();
    repo.put_session(&started.session).await.unwrap();
    assert_eq!(sub.next().await.unwrap().status(), SessionStatus::InProgress);
}

#[tokio::test]
async fn sqlite_records_upsert_by_category() {
    let repo = open("memdb_records").await;
    let session_id = SessionId::generate();
    let record = |category, value| PersonalRecord {
        user_id: UserId::new(1),
        exercise_id: ExerciseId::new(10),
        exercise_name: "Bench Press".into(),
        category,
        value,
        achieved_at: fixed_now(),
        session_id: Some(session_id),
    };

    repo.upsert_records(&[
        record(RecordCategory::MaxWeight, 60.0),
        record(RecordCategory::MaxReps, 8.0),
    ])
    .await
    .unwrap();
    repo.upsert_records(&[record(RecordCategory::MaxWeight, 65.0)])
        .await
        .unwrap();

    let bests = repo
        .best_records(UserId::new(1), ExerciseId::new(10))
        .await
        .unwrap();
    assert_eq!(bests.len(), 2);
    let weight = bests
        .iter()
        .find(|r| r.category == RecordCategory::MaxWeight)
        .unwrap();
    assert_eq!(weight.value, 65.0);
    assert_eq!(weight.session_id, Some(session_id));

    let other = repo
        .best_records(UserId::new(2), ExerciseId::new(10))
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn sqlite_catalog_resolves_in_input_order() {
    let storage = Storage::sqlite("sqlite:file:memdb_catalog?mode=memory&cache=shared")
        .await
        .expect("storage");

    let mut squat = ExerciseSummary::new(ExerciseId::new(1), "Squat");
    squat.image_url = Some("https://example.test/squat.png".into());
    storage.exercises.upsert_exercise(&squat).await.unwrap();
    storage
        .exercises
        .upsert_exercise(&ExerciseSummary::new(ExerciseId::new(2), "Deadlift"))
        .await
        .unwrap();

    let found = storage
        .exercises
        .resolve(&[ExerciseId::new(2), ExerciseId::new(99), ExerciseId::new(1)])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].name, "Deadlift");
    assert_eq!(found[1], squat);
}
