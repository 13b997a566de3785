use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use lift_core::model::{
    ExerciseId, ExerciseSummary, NewRecord, PlanId, PlannedExercise, PlannedSet, SessionId,
    SessionStatus, UserId, WorkoutPlan, WorkoutSession,
};
use lift_core::time::fixed_clock;
use lift_core::workout::SetPerformance;
use services::{
    Clock, Confirmation, PerformedSet, PersonalRecordEvaluator, PersonalRecordService,
    RecordError, SessionError, WorkoutConfig, WorkoutNotice, WorkoutService,
};
use storage::feed::SessionSubscription;
use storage::repository::{
    ExerciseCatalog, InMemoryRepository, StorageError, WorkoutSessionRepository,
};
use tokio::sync::broadcast;

const USER: UserId = UserId::new(1);

fn single_exercise_plan(sets: usize, rest_seconds: u32) -> WorkoutPlan {
    WorkoutPlan::new(
        PlanId::new(1),
        "Squat Day",
        vec![PlannedExercise::new(
            ExerciseId::new(1),
            "Back Squat",
            rest_seconds,
            vec![PlannedSet::new(20.0, 10); sets],
        )],
    )
}

fn two_exercise_plan() -> WorkoutPlan {
    WorkoutPlan::new(
        PlanId::new(2),
        "Push",
        vec![
            PlannedExercise::new(
                ExerciseId::new(2),
                "Bench Press",
                60,
                vec![PlannedSet::new(60.0, 8), PlannedSet::new(60.0, 8)],
            ),
            PlannedExercise::new(
                ExerciseId::new(4),
                "Overhead Press",
                60,
                vec![PlannedSet::new(40.0, 10)],
            ),
        ],
    )
}

fn manual_config() -> WorkoutConfig {
    WorkoutConfig::default().with_start_ticker(false)
}

async fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    for (id, name) in [
        (1, "Back Squat"),
        (2, "Bench Press"),
        (3, "Front Squat"),
        (4, "Overhead Press"),
        (5, "Dips"),
    ] {
        repo.upsert_exercise(&ExerciseSummary::new(ExerciseId::new(id), name))
            .await
            .unwrap();
    }
    repo
}

fn service_with(
    repo: &InMemoryRepository,
    sessions: Arc<dyn WorkoutSessionRepository>,
    evaluator: Arc<dyn PersonalRecordEvaluator>,
    clock: Clock,
    config: WorkoutConfig,
) -> WorkoutService {
    WorkoutService::new(clock, sessions, Arc::new(repo.clone()), evaluator).with_config(config)
}

fn service(repo: &InMemoryRepository, clock: Clock) -> WorkoutService {
    service_with(
        repo,
        Arc::new(repo.clone()),
        Arc::new(PersonalRecordService::new(Arc::new(repo.clone()))),
        clock,
        manual_config(),
    )
}

fn drain(notices: &mut broadcast::Receiver<WorkoutNotice>) -> Vec<WorkoutNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        out.push(notice);
    }
    out
}

/// Session store whose writes can be switched off, and whose next
/// active-session lookup can be blinded to mimic two starts racing.
#[derive(Clone)]
struct FlakyStore {
    inner: InMemoryRepository,
    fail_puts: Arc<AtomicBool>,
    hide_active_once: Arc<AtomicBool>,
}

impl FlakyStore {
    fn new(inner: &InMemoryRepository) -> Self {
        Self {
            inner: inner.clone(),
            fail_puts: Arc::new(AtomicBool::new(false)),
            hide_active_once: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl WorkoutSessionRepository for FlakyStore {
    async fn get_session(&self, id: SessionId) -> Result<WorkoutSession, StorageError> {
        self.inner.get_session(id).await
    }

    async fn put_session(&self, session: &WorkoutSession) -> Result<(), StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("disk unplugged".into()));
        }
        self.inner.put_session(session).await
    }

    async fn subscribe_session(
        &self,
        id: SessionId,
    ) -> Result<SessionSubscription, StorageError> {
        self.inner.subscribe_session(id).await
    }

    async fn active_session_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<WorkoutSession>, StorageError> {
        if self.hide_active_once.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.active_session_for_user(user_id).await
    }
}

struct FailingEvaluator;

#[async_trait]
impl PersonalRecordEvaluator for FailingEvaluator {
    async fn evaluate(&self, _performed: &PerformedSet) -> Result<Vec<NewRecord>, RecordError> {
        Err(RecordError::Storage(StorageError::Connection(
            "records offline".into(),
        )))
    }
}

struct SlowEvaluator;

#[async_trait]
impl PersonalRecordEvaluator for SlowEvaluator {
    async fn evaluate(&self, _performed: &PerformedSet) -> Result<Vec<NewRecord>, RecordError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn completing_a_set_rests_then_advances_after_ninety_ticks() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(2, 90))
        .await
        .unwrap();
    let mut notices = handle.notices();

    let done = handle.complete_current_set(22.0, 8).await.unwrap();
    assert_eq!(done.view.status, SessionStatus::Resting);
    assert_eq!(done.view.rest_remaining_ms, Some(90_000));
    assert_eq!(done.view.completion_percentage, 50.0);
    assert_eq!(done.view.total_volume, 176.0);

    for _ in 0..89 {
        let view = handle.tick().await.unwrap();
        assert_eq!(view.status, SessionStatus::Resting);
    }
    let view = handle.tick().await.unwrap();
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!(view.set_index, 1);
    assert_eq!(view.rest_remaining_ms, None);
    assert_eq!(view.weight_input, 20.0);
    assert_eq!(view.reps_input, 10);

    let seen = drain(&mut notices);
    assert!(seen.contains(&WorkoutNotice::RestFinished {
        exercise_index: 0,
        set_index: 1,
    }));

    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert_eq!(stored.status(), SessionStatus::InProgress);
    assert!(stored.rest().is_none());
}

#[tokio::test]
async fn finishing_every_set_asks_for_confirmation() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(2, 90))
        .await
        .unwrap();

    handle.complete_current_set(20.0, 10).await.unwrap();
    handle.skip_rest().await.unwrap();
    let last = handle.complete_current_set(20.0, 10).await.unwrap();

    assert_eq!(last.view.completion_percentage, 100.0);
    assert_eq!(last.view.status, SessionStatus::InProgress);
    assert_eq!(last.view.rest_remaining_ms, None);
    assert_eq!(last.view.confirmation, Some(Confirmation::CompleteWorkout));

    let finished = handle.complete().await.unwrap();
    assert_eq!(finished.status, SessionStatus::Completed);
    assert_eq!(finished.confirmation, None);

    let err = handle.complete_current_set(20.0, 10).await.unwrap_err();
    assert!(matches!(err, SessionError::Finished(SessionStatus::Completed)));
    let err = handle.add_set().await.unwrap_err();
    assert!(matches!(err, SessionError::Finished(_)));

    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert!(stored.ended_at().is_some());
    assert!(repo.active_session_for_user(USER).await.unwrap().is_none());
}

#[tokio::test]
async fn auto_complete_skips_the_confirmation() {
    let repo = seeded_repo().await;
    let workouts = service_with(
        &repo,
        Arc::new(repo.clone()),
        Arc::new(PersonalRecordService::new(Arc::new(repo.clone()))),
        fixed_clock(),
        manual_config().with_auto_complete_when_done(true),
    );
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(1, 90))
        .await
        .unwrap();

    let done = handle.complete_current_set(20.0, 10).await.unwrap();
    assert_eq!(done.view.status, SessionStatus::Completed);
}

#[tokio::test]
async fn invalid_input_changes_nothing() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(2, 90))
        .await
        .unwrap();
    let before_view = handle.view();
    let before = repo.get_session(handle.session_id()).await.unwrap();

    let err = handle.complete_current_set(0.0, 10).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));
    assert!(err.is_recoverable());

    let err = handle
        .complete_set(SetPerformance::new(20.0, 10).with_effort(11))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));

    assert_eq!(handle.snapshot().await.unwrap(), before_view);
    assert_eq!(repo.get_session(handle.session_id()).await.unwrap(), before);
}

#[tokio::test]
async fn removing_the_last_set_of_the_only_exercise_asks_to_abandon() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(1, 90))
        .await
        .unwrap();
    let mut notices = handle.notices();
    let before = repo.get_session(handle.session_id()).await.unwrap();

    let view = handle.remove_set().await.unwrap();
    assert_eq!(view.confirmation, Some(Confirmation::AbandonWorkout));
    assert_eq!(view.sets_in_exercise, 1);
    assert_eq!(repo.get_session(handle.session_id()).await.unwrap(), before);
    assert!(drain(&mut notices).contains(&WorkoutNotice::ConfirmAbandon));

    let abandoned = handle.abandon().await.unwrap();
    assert_eq!(abandoned.status, SessionStatus::Abandoned);
}

#[tokio::test]
async fn paused_time_is_excluded_from_elapsed() {
    let repo = seeded_repo().await;
    let clock = fixed_clock();
    let workouts = service(&repo, clock.clone());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(2, 90))
        .await
        .unwrap();

    handle.pause().await.unwrap();
    clock.advance(ChronoDuration::seconds(30));
    let paused = handle.tick().await.unwrap();
    assert_eq!(paused.elapsed_ms, 0);

    handle.resume().await.unwrap();
    clock.advance(ChronoDuration::seconds(10));
    let view = handle.tick().await.unwrap();

    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert!(stored.paused_ms() >= 30_000);
    assert!(stored.pause_started_at().is_none());
    assert_eq!(view.elapsed_ms, 10_000);
}

#[tokio::test]
async fn resuming_a_pause_taken_mid_rest_advances_once() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    handle.complete_current_set(60.0, 8).await.unwrap();
    let paused = handle.pause().await.unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);
    assert_eq!(paused.set_index, 0);

    let resumed = handle.resume().await.unwrap();
    assert_eq!(resumed.status, SessionStatus::InProgress);
    assert_eq!((resumed.exercise_index, resumed.set_index), (0, 1));

    let after_tick = handle.tick().await.unwrap();
    assert_eq!((after_tick.exercise_index, after_tick.set_index), (0, 1));
}

#[tokio::test]
async fn status_guards_reject_out_of_order_actions() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    let err = handle.skip_rest().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidTransition {
            from: SessionStatus::InProgress,
            ..
        }
    ));
    assert!(matches!(
        handle.resume().await.unwrap_err(),
        SessionError::InvalidTransition { .. }
    ));
    assert!(matches!(
        handle.start().await.unwrap_err(),
        SessionError::InvalidTransition { .. }
    ));

    handle.pause().await.unwrap();
    assert!(matches!(
        handle.skip_current_set().await.unwrap_err(),
        SessionError::InvalidTransition { .. }
    ));
}

#[tokio::test]
async fn skipping_moves_on_without_resting() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    handle.skip_current_set().await.unwrap();
    let view = handle.skip_current_set().await.unwrap();
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!((view.exercise_index, view.set_index), (1, 0));
    assert_eq!(view.completion_percentage, 0.0);
    assert_eq!(view.total_volume, 0.0);
}

#[tokio::test]
async fn the_duration_guard_pauses_a_long_session() {
    let repo = seeded_repo().await;
    let clock = fixed_clock();
    let workouts = service_with(
        &repo,
        Arc::new(repo.clone()),
        Arc::new(PersonalRecordService::new(Arc::new(repo.clone()))),
        clock.clone(),
        manual_config().with_max_active_duration(Duration::from_secs(60)),
    );
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();
    let mut notices = handle.notices();

    clock.advance(ChronoDuration::seconds(61));
    let view = handle.tick().await.unwrap();
    assert_eq!(view.status, SessionStatus::Paused);
    assert!(drain(&mut notices)
        .iter()
        .any(|n| matches!(n, WorkoutNotice::AutoPaused { .. })));

    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert_eq!(stored.status(), SessionStatus::Paused);
}

#[tokio::test]
async fn appending_exercises_reopens_a_finished_plan() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(1, 90))
        .await
        .unwrap();

    let done = handle.complete_current_set(20.0, 10).await.unwrap();
    assert_eq!(done.view.confirmation, Some(Confirmation::CompleteWorkout));

    let view = handle
        .add_exercises(vec![ExerciseId::new(5), ExerciseId::new(999)])
        .await
        .unwrap();
    assert_eq!(view.confirmation, None);
    assert!(view.plan_modified);
    assert_eq!(view.exercise_index, 1);
    assert_eq!(view.exercise_name.as_deref(), Some("Dips"));
    assert_eq!(view.target, Some(PlannedSet::new(0.0, 10)));
    assert_eq!(view.completion_percentage, 50.0);

    let err = handle
        .add_exercises(vec![ExerciseId::new(999)])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));
}

#[tokio::test]
async fn replacing_an_exercise_keeps_its_origin() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(2, 90))
        .await
        .unwrap();

    handle.complete_current_set(20.0, 10).await.unwrap();
    let view = handle
        .replace_current_exercise(ExerciseId::new(3))
        .await
        .unwrap();
    assert_eq!(view.exercise_name.as_deref(), Some("Front Squat"));
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!(view.set_index, 0);
    assert_eq!(view.completion_percentage, 0.0);

    handle
        .replace_current_exercise(ExerciseId::new(1))
        .await
        .unwrap();
    let stored = repo.get_session(handle.session_id()).await.unwrap();
    let exercise = &stored.exercises()[0];
    assert_eq!(exercise.exercise_id(), ExerciseId::new(1));
    assert_eq!(exercise.replaced_from(), Some(ExerciseId::new(1)));
    assert!(stored.plan_modified());

    let err = handle
        .replace_current_exercise(ExerciseId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));
}

#[tokio::test]
async fn removing_sets_keeps_the_cursor_on_real_work() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    let view = handle.add_set().await.unwrap();
    assert_eq!(view.sets_in_exercise, 3);
    handle.remove_set().await.unwrap();
    handle.remove_set().await.unwrap();
    let view = handle.remove_set().await.unwrap();

    // The bench press ran out of sets and was dropped.
    assert_eq!(view.exercise_index, 0);
    assert_eq!(view.exercise_name.as_deref(), Some("Overhead Press"));
    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert_eq!(stored.exercises().len(), 1);
}

#[tokio::test]
async fn a_set_added_after_the_last_one_is_performed_next() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &single_exercise_plan(2, 0))
        .await
        .unwrap();

    handle.complete_current_set(20.0, 10).await.unwrap();
    let done = handle.complete_current_set(20.0, 10).await.unwrap();
    assert_eq!(done.view.confirmation, Some(Confirmation::CompleteWorkout));

    let view = handle.add_set().await.unwrap();
    assert_eq!(view.sets_in_exercise, 3);
    assert_eq!(view.set_index, 2);
    assert_eq!(view.confirmation, None);

    let done = handle.complete_current_set(30.0, 5).await.unwrap();
    assert_eq!(done.view.confirmation, Some(Confirmation::CompleteWorkout));

    let stored = repo.get_session(handle.session_id()).await.unwrap();
    let performed: Vec<(u32, f64)> = stored.exercises()[0]
        .executed_sets()
        .iter()
        .map(|s| (s.set_number(), s.actual_weight()))
        .collect();
    assert_eq!(performed, vec![(1, 20.0), (2, 20.0), (3, 30.0)]);
    assert!((stored.completion_percentage() - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn inputs_and_notes_are_editable() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    let view = handle.update_inputs(62.5, 6).await.unwrap();
    assert_eq!((view.weight_input, view.reps_input), (62.5, 6));
    assert!(handle.update_inputs(-1.0, 6).await.is_err());

    handle.set_notes("felt strong").await.unwrap();
    let view = handle.select_exercise(1).await.unwrap();
    assert_eq!(view.exercise_index, 1);
    assert_eq!(view.weight_input, 40.0);
    assert!(matches!(
        handle.select_exercise(7).await.unwrap_err(),
        SessionError::InvalidInput(_)
    ));

    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert_eq!(stored.notes(), "felt strong");
}

#[tokio::test]
async fn first_sets_break_records_and_report_them() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();
    let mut notices = handle.notices();

    let first = handle.complete_current_set(60.0, 8).await.unwrap();
    assert_eq!(first.new_records.len(), 4);
    assert!(drain(&mut notices)
        .iter()
        .any(|n| matches!(n, WorkoutNotice::NewRecords { records, .. } if records.len() == 4)));

    handle.skip_rest().await.unwrap();
    let second = handle.complete_current_set(60.0, 8).await.unwrap();
    assert!(second.new_records.is_empty());
}

#[tokio::test]
async fn evaluator_failure_does_not_fail_the_set() {
    let repo = seeded_repo().await;
    let workouts = service_with(
        &repo,
        Arc::new(repo.clone()),
        Arc::new(FailingEvaluator),
        fixed_clock(),
        manual_config(),
    );
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    let done = handle.complete_current_set(60.0, 8).await.unwrap();
    assert!(done.new_records.is_empty());
    assert_eq!(done.view.status, SessionStatus::Resting);
    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert_eq!(stored.total_volume(), 480.0);
}

#[tokio::test(start_paused = true)]
async fn slow_evaluator_is_cut_off() {
    let repo = seeded_repo().await;
    let workouts = service_with(
        &repo,
        Arc::new(repo.clone()),
        Arc::new(SlowEvaluator),
        fixed_clock(),
        manual_config().with_record_timeout(Duration::from_millis(500)),
    );
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    let done = handle.complete_current_set(60.0, 8).await.unwrap();
    assert!(done.new_records.is_empty());
    assert_eq!(done.view.status, SessionStatus::Resting);
}

#[tokio::test]
async fn failed_write_leaves_the_cursor_alone() {
    let repo = seeded_repo().await;
    let store = FlakyStore::new(&repo);
    let workouts = service_with(
        &repo,
        Arc::new(store.clone()),
        Arc::new(PersonalRecordService::new(Arc::new(repo.clone()))),
        fixed_clock(),
        manual_config(),
    );
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    store.fail_puts.store(true, Ordering::SeqCst);
    let err = handle.complete_current_set(60.0, 8).await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    let view = handle.snapshot().await.unwrap();
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!((view.exercise_index, view.set_index), (0, 0));
    assert_eq!(view.completion_percentage, 0.0);

    store.fail_puts.store(false, Ordering::SeqCst);
    let retried = handle.complete_current_set(60.0, 8).await.unwrap();
    assert_eq!(retried.view.status, SessionStatus::Resting);
    let stored = repo.get_session(handle.session_id()).await.unwrap();
    assert_eq!(stored.exercises()[0].executed_sets().len(), 1);
}

#[tokio::test]
async fn record_feed_follows_the_runtime() {
    let repo = seeded_repo().await;
    let workouts = service(&repo, fixed_clock());
    let handle = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    let mut feed = handle.subscribe_record().await.unwrap();
    assert_eq!(
        feed.next().await.unwrap().status(),
        SessionStatus::InProgress
    );
    handle.complete_current_set(60.0, 8).await.unwrap();
    assert_eq!(feed.next().await.unwrap().status(), SessionStatus::Resting);
}

#[tokio::test]
async fn a_start_that_loses_the_race_reports_the_winner() {
    let repo = seeded_repo().await;
    let store = FlakyStore::new(&repo);
    let workouts = service_with(
        &repo,
        Arc::new(store.clone()),
        Arc::new(PersonalRecordService::new(Arc::new(repo.clone()))),
        fixed_clock(),
        manual_config(),
    );
    let winner = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap();

    store.hide_active_once.store(true, Ordering::SeqCst);
    let err = workouts
        .start_workout(USER, &two_exercise_plan())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AlreadyActive(id) if id == winner.session_id()));

    let active = repo.active_session_for_user(USER).await.unwrap();
    assert_eq!(active.map(|s| s.id()), Some(winner.session_id()));
    winner.complete_current_set(60.0, 8).await.unwrap();
}
