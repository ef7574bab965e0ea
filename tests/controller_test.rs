use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::stream;
use rams_generation_client::config::GenerationConfig;
use rams_generation_client::{
    GenerationController, GenerationError, GenerationInput, GenerationJob, GenerationState,
    InMemoryBackend, InMemorySessionStore, JobScale, JobStatus, JobUpdate, MethodStatement,
    MethodStep, ProjectInfo, RiskAssessment, RiskLevel, SessionMarker, SessionStore,
};
use uuid::Uuid;

fn generation_config() -> GenerationConfig {
    GenerationConfig {
        poll_interval_ms: 10,
        poll_failure_threshold: 3,
        total_budget_secs: 300,
        overdue_after_secs: 240,
        surface_creation_failures: true,
    }
}

fn valid_input() -> GenerationInput {
    GenerationInput {
        description: "Full rewire of a three-bed terrace including new consumer unit".to_string(),
        project_info: ProjectInfo {
            project_name: "14 Mill Lane rewire".to_string(),
            location: "Stockport".to_string(),
            assessor: "D. Okafor".to_string(),
            contractor: "Volt & Spark Ltd".to_string(),
            supervisor: "J. McAllister".to_string(),
        },
        scale: JobScale::Domestic,
    }
}

fn sample_document() -> MethodStatement {
    MethodStatement {
        title: "14 Mill Lane rewire".to_string(),
        location: "Stockport".to_string(),
        contractor: "Volt & Spark Ltd".to_string(),
        supervisor: "J. McAllister".to_string(),
        overall_risk_level: RiskLevel::High,
        total_estimated_time: Some("4 days".to_string()),
        steps: vec![MethodStep {
            number: 1,
            title: "Safe isolation".to_string(),
            description: "1. Identify the supply. 2. Isolate and lock off. 3. Prove dead."
                .to_string(),
            duration: Some("30 minutes".to_string()),
            risk_level: RiskLevel::VeryHigh,
            safety_requirements: vec!["Lock-off kit".to_string()],
            equipment: vec!["Two-pole tester".to_string()],
            qualifications: vec!["18th Edition".to_string()],
            notes: None,
        }],
        risk_assessment: RiskAssessment::default(),
        ppe: vec![],
        compliance_regulations: vec!["BS 7671:2018+A2:2022".to_string()],
        emergency_procedures: vec![],
    }
}

fn processing_job(user_id: Uuid, progress: u8, started_secs_ago: i64) -> GenerationJob {
    let now = Utc::now();
    GenerationJob {
        id: Uuid::new_v4(),
        user_id,
        status: JobStatus::Processing,
        progress,
        current_step: Some("Drafting method steps".to_string()),
        document: None,
        error_message: None,
        created_at: now - Duration::seconds(started_secs_ago + 5),
        started_at: Some(now - Duration::seconds(started_secs_ago)),
        completed_at: None,
    }
}

fn processing_update(job_id: Uuid, progress: u8, step: &str) -> JobUpdate {
    JobUpdate {
        job_id,
        status: JobStatus::Processing,
        progress,
        current_step: Some(step.to_string()),
        document: None,
        error: None,
    }
}

fn complete_update(job_id: Uuid, document: Option<MethodStatement>) -> JobUpdate {
    JobUpdate {
        job_id,
        status: JobStatus::Complete,
        progress: 100,
        current_step: None,
        document,
        error: None,
    }
}

struct Harness {
    backend: Arc<InMemoryBackend>,
    session: Arc<InMemorySessionStore>,
    controller: GenerationController,
}

fn harness() -> Harness {
    harness_for_user(Uuid::new_v4())
}

fn harness_for_user(user_id: Uuid) -> Harness {
    let backend = Arc::new(InMemoryBackend::new());
    let session = Arc::new(InMemorySessionStore::new());
    let controller = GenerationController::new(
        backend.clone(),
        session.clone(),
        generation_config(),
        user_id,
    );
    Harness {
        backend,
        session,
        controller,
    }
}

#[tokio::test]
async fn given_blank_description_when_submitting_then_no_job_is_created() {
    let mut h = harness();
    let mut input = valid_input();
    input.description = "   ".to_string();

    let result = h.controller.submit(&input).await;

    assert!(matches!(
        result,
        Err(GenerationError::MissingField("job description"))
    ));
    assert_eq!(h.backend.create_calls().await, 0);
    assert!(h.controller.state().is_idle());
    assert_eq!(h.session.load().unwrap(), None);
}

#[tokio::test]
async fn given_valid_input_when_submitting_then_polling_begins() {
    let mut h = harness();

    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();

    match h.controller.state() {
        GenerationState::Polling {
            job_id: polled,
            resumed,
            progress,
            ..
        } => {
            assert_eq!(*polled, job_id);
            assert!(!resumed);
            assert_eq!(*progress, 0);
        }
        other => panic!("expected polling, got {other:?}"),
    }
    assert!(h.controller.started_at().is_some());

    let marker = h.session.load().unwrap().expect("marker written");
    assert_eq!(marker.job_id, Some(job_id));
}

#[tokio::test]
async fn given_creation_failure_when_surfacing_is_on_then_submit_errors_and_resets() {
    let mut h = harness();
    h.backend.set_fail_creation(true).await;

    let result = h.controller.submit(&valid_input()).await;

    assert!(matches!(result, Err(GenerationError::CreationFailed(_))));
    assert!(h.controller.state().is_idle());
    assert_eq!(h.session.load().unwrap(), None);
}

#[tokio::test]
async fn given_creation_failure_when_surfacing_is_off_then_submit_stays_quiet() {
    let backend = Arc::new(InMemoryBackend::new());
    let session = Arc::new(InMemorySessionStore::new());
    let mut config = generation_config();
    config.surface_creation_failures = false;
    let mut controller =
        GenerationController::new(backend.clone(), session.clone(), config, Uuid::new_v4());
    backend.set_fail_creation(true).await;

    let result = controller.submit(&valid_input()).await.unwrap();

    assert_eq!(result, None);
    assert!(controller.state().is_idle());
    assert_eq!(backend.create_calls().await, 1);
}

#[tokio::test]
async fn given_progress_updates_when_applied_then_state_tracks_them() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();

    h.controller
        .apply_update(processing_update(job_id, 42, "Identifying hazards"));

    match h.controller.state() {
        GenerationState::Polling {
            progress,
            current_step,
            ..
        } => {
            assert_eq!(*progress, 42);
            assert_eq!(current_step.as_deref(), Some("Identifying hazards"));
        }
        other => panic!("expected polling, got {other:?}"),
    }
    assert_eq!(h.controller.progress(), 42);
    assert_eq!(h.controller.remaining_estimate(), 174);

    h.controller
        .apply_update(processing_update(job_id, 80, "Reviewing the draft"));
    assert_eq!(h.controller.progress(), 80);
    assert_eq!(h.controller.remaining_estimate(), 60);
}

#[tokio::test]
async fn given_update_for_another_job_when_applied_then_it_is_ignored() {
    let mut h = harness();
    h.controller.submit(&valid_input()).await.unwrap().unwrap();

    h.controller
        .apply_update(processing_update(Uuid::new_v4(), 90, "Someone else's job"));

    assert_eq!(h.controller.progress(), 0);
}

#[tokio::test]
async fn given_complete_status_without_steps_when_applied_then_polling_continues() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();

    h.controller.apply_update(complete_update(job_id, None));
    assert!(h.controller.state().is_polling());

    let mut empty = sample_document();
    empty.steps.clear();
    h.controller
        .apply_update(complete_update(job_id, Some(empty)));
    assert!(h.controller.state().is_polling());
}

#[tokio::test]
async fn given_completed_document_when_applied_then_celebration_fires_exactly_once() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();

    h.controller
        .apply_update(complete_update(job_id, Some(sample_document())));

    match h.controller.state() {
        GenerationState::Completed { document, .. } => {
            assert_eq!(document.title, "14 Mill Lane rewire");
        }
        other => panic!("expected completed, got {other:?}"),
    }
    assert_eq!(h.session.load().unwrap(), None);

    let stats = h.controller.take_celebration().expect("first completion celebrates");
    assert_eq!(stats.steps, 1);
    assert_eq!(stats.total_duration, "4 days");
    assert_eq!(stats.risk_level, RiskLevel::High);

    assert!(h.controller.take_celebration().is_none());

    // A late duplicate terminal update must not re-arm the banner.
    h.controller
        .apply_update(complete_update(job_id, Some(sample_document())));
    assert!(h.controller.take_celebration().is_none());
}

#[tokio::test]
async fn given_remote_error_when_applied_then_state_is_errored() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();

    h.controller.apply_update(JobUpdate::failed(
        job_id,
        "model refused to produce a document",
    ));

    match h.controller.state() {
        GenerationState::Errored {
            job_id: errored,
            message,
        } => {
            assert_eq!(*errored, job_id);
            assert_eq!(message, "model refused to produce a document");
        }
        other => panic!("expected errored, got {other:?}"),
    }
    assert_eq!(h.session.load().unwrap(), None);
}

#[tokio::test]
async fn given_confirmed_cancellation_when_cancelling_then_everything_resets() {
    let mut h = harness();
    h.controller.submit(&valid_input()).await.unwrap().unwrap();

    h.controller.cancel().await.unwrap();

    assert!(h.controller.state().is_idle());
    assert_eq!(h.controller.started_at(), None);
    assert_eq!(h.controller.elapsed_seconds(), 0);
    assert_eq!(h.session.load().unwrap(), None);
    assert_eq!(h.backend.cancel_calls().await, 1);
}

#[tokio::test]
async fn given_rejected_cancellation_when_cancelling_then_job_is_presumed_running() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();
    h.backend.set_reject_cancellation(true).await;

    let result = h.controller.cancel().await;

    assert!(matches!(result, Err(GenerationError::CancellationFailed(_))));
    assert_eq!(h.controller.state().job_id(), Some(job_id));
    assert!(h.controller.state().is_polling());
    assert!(h.session.load().unwrap().is_some());
}

#[tokio::test]
async fn given_no_active_job_when_cancelling_then_backend_is_not_called() {
    let mut h = harness();

    let result = h.controller.cancel().await;

    assert!(matches!(result, Err(GenerationError::NoActiveJob)));
    assert_eq!(h.backend.cancel_calls().await, 0);
}

#[tokio::test]
async fn given_errored_run_when_starting_over_then_state_resets_without_cancelling() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();
    h.controller
        .apply_update(JobUpdate::failed(job_id, "generation failed"));

    h.controller.start_over();

    assert!(h.controller.state().is_idle());
    assert_eq!(h.controller.started_at(), None);
    assert_eq!(h.session.load().unwrap(), None);
    assert_eq!(h.backend.cancel_calls().await, 0);
}

#[tokio::test]
async fn given_marker_and_active_job_when_resuming_then_polling_is_adopted() {
    let user_id = Uuid::new_v4();
    let mut h = harness_for_user(user_id);
    let job = processing_job(user_id, 42, 30);
    let job_id = job.id;
    let started_at = job.started_at;
    h.backend.insert_job(job).await;
    h.session
        .save(&SessionMarker {
            job_id: Some(job_id),
            started_at: Utc::now() - Duration::seconds(30),
        })
        .unwrap();

    let resumed_id = h.controller.resume().await.unwrap();

    assert_eq!(resumed_id, Some(job_id));
    match h.controller.state() {
        GenerationState::Polling {
            job_id: polled,
            resumed,
            progress,
            current_step,
        } => {
            assert_eq!(*polled, job_id);
            assert!(resumed);
            assert_eq!(*progress, 42);
            assert_eq!(current_step.as_deref(), Some("Drafting method steps"));
        }
        other => panic!("expected polling, got {other:?}"),
    }
    // Elapsed time carries over from the adopted job's own start.
    assert_eq!(h.controller.started_at(), started_at);
    assert!(h.controller.elapsed_seconds() >= 29);
}

#[tokio::test]
async fn given_stale_marker_when_resuming_then_marker_is_cleared_quietly() {
    let mut h = harness();
    h.session
        .save(&SessionMarker {
            job_id: Some(Uuid::new_v4()),
            started_at: Utc::now(),
        })
        .unwrap();

    let resumed = h.controller.resume().await.unwrap();

    assert_eq!(resumed, None);
    assert!(h.controller.state().is_idle());
    assert_eq!(h.session.load().unwrap(), None);
}

#[tokio::test]
async fn given_no_marker_when_resuming_then_backend_is_not_queried() {
    let mut h = harness();

    let resumed = h.controller.resume().await.unwrap();

    assert_eq!(resumed, None);
    assert_eq!(h.backend.find_calls().await, 0);
}

#[tokio::test]
async fn given_long_running_resumed_job_when_checked_then_it_is_overdue() {
    let user_id = Uuid::new_v4();
    let mut h = harness_for_user(user_id);
    let job = processing_job(user_id, 10, 241);
    h.backend.insert_job(job).await;
    h.session
        .save(&SessionMarker {
            job_id: None,
            started_at: Utc::now() - Duration::seconds(241),
        })
        .unwrap();

    h.controller.resume().await.unwrap();

    assert!(h.controller.is_overdue());
    assert_eq!(h.controller.remaining_estimate(), 270);
}

#[tokio::test]
async fn given_fresh_submission_when_checked_then_it_is_not_overdue() {
    let mut h = harness();
    h.controller.submit(&valid_input()).await.unwrap().unwrap();

    assert!(!h.controller.is_overdue());
    assert_eq!(h.controller.remaining_estimate(), 300);
}

#[tokio::test]
async fn given_unfinished_run_when_saving_then_there_is_nothing_to_save() {
    let mut h = harness();
    h.controller.submit(&valid_input()).await.unwrap().unwrap();

    let result = h.controller.save().await;

    assert!(matches!(result, Err(GenerationError::NothingToSave)));
    assert_eq!(h.backend.save_calls().await, 0);
}

#[tokio::test]
async fn given_edited_document_when_saving_then_edits_reach_the_backend() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();
    h.controller
        .apply_update(complete_update(job_id, Some(sample_document())));

    let document = h.controller.document_mut().expect("editable document");
    document.title = "14 Mill Lane rewire (rev B)".to_string();
    document.steps[0].safety_requirements.push("Signage at the board".to_string());

    h.controller.save().await.unwrap();

    assert!(h.controller.last_saved_at().is_some());
    let stored = h.backend.job(job_id).await.unwrap().document.unwrap();
    assert_eq!(stored.title, "14 Mill Lane rewire (rev B)");
    assert_eq!(stored.steps[0].safety_requirements.len(), 2);
}

#[tokio::test]
async fn given_save_failure_when_saving_then_document_is_kept_locally() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();
    h.controller
        .apply_update(complete_update(job_id, Some(sample_document())));
    h.backend.set_fail_save(true).await;

    let result = h.controller.save().await;

    assert!(matches!(result, Err(GenerationError::SaveFailed(_))));
    assert_eq!(h.controller.last_saved_at(), None);
    assert!(h.controller.document().is_some());
}

#[tokio::test]
async fn given_resumed_job_when_completing_then_celebration_uses_the_original_start() {
    let user_id = Uuid::new_v4();
    let mut h = harness_for_user(user_id);
    let job = processing_job(user_id, 90, 30);
    let job_id = job.id;
    h.backend.insert_job(job).await;
    h.session
        .save(&SessionMarker {
            job_id: Some(job_id),
            started_at: Utc::now() - Duration::seconds(30),
        })
        .unwrap();
    h.controller.resume().await.unwrap();

    h.controller
        .apply_update(complete_update(job_id, Some(sample_document())));

    let stats = h.controller.take_celebration().expect("completion celebrates");
    assert!(stats.generation_seconds >= 29);
}

#[tokio::test]
async fn given_a_scripted_stream_when_driving_then_it_stops_at_the_terminal_update() {
    let mut h = harness();
    let job_id = h.controller.submit(&valid_input()).await.unwrap().unwrap();

    let updates = vec![
        processing_update(job_id, 25, "Assessing risks"),
        processing_update(job_id, 75, "Drafting method steps"),
        complete_update(job_id, Some(sample_document())),
        // Anything after the terminal update must never be applied.
        processing_update(job_id, 10, "Ghost update"),
    ];
    h.controller.drive(Box::pin(stream::iter(updates))).await;

    match h.controller.state() {
        GenerationState::Completed { job_id: done, .. } => assert_eq!(*done, job_id),
        other => panic!("expected completed, got {other:?}"),
    }
    assert!(h.controller.take_celebration().is_some());
}

#[tokio::test]
async fn given_active_polling_when_submitting_again_then_it_is_rejected() {
    let mut h = harness();
    h.controller.submit(&valid_input()).await.unwrap().unwrap();

    let result = h.controller.submit(&valid_input()).await;

    assert!(matches!(result, Err(GenerationError::AlreadyRunning)));
    assert_eq!(h.backend.create_calls().await, 1);
}
