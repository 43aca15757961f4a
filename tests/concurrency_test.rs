mod common;

use assessment_backend::{
    error::Error,
    models::quiz_attempt::AttemptKey,
    services::{attempt_store::AttemptStore, integrity_service::ViolationKind},
};
use common::{pick, two_question_quiz, TestApp};
use futures::future::join_all;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_admit_exactly_one_attempt() {
    let app = TestApp::new(two_question_quiz(3, 10));

    let handles = (0..8).map(|_| {
        let svc = app.state.admission_service.clone();
        let (student, quiz) = (app.student, app.quiz.id);
        tokio::spawn(async move { svc.request_attempt(student, quiz).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::AttemptAlreadyActive)));

    let slot = app
        .store
        .snapshot(&AttemptKey::new(app.student, app.quiz.id))
        .await
        .unwrap();
    assert_eq!(slot.attempts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leave_racing_submit_finalizes_once() {
    for _ in 0..20 {
        let app = TestApp::new(two_question_quiz(1, 10));
        app.state
            .admission_service
            .request_attempt(app.student, app.quiz.id)
            .await
            .unwrap();

        let integrity = app.state.integrity_service.clone();
        let submission = app.state.submission_service.clone();
        let (student, quiz_id) = (app.student, app.quiz.id);
        let answers = vec![pick(&app.quiz, 0, 0), pick(&app.quiz, 1, 1)];

        let leave = tokio::spawn(async move {
            integrity
                .record_event(student, quiz_id, ViolationKind::Leave)
                .await
        });
        let submit = tokio::spawn(async move { submission.submit(student, quiz_id, answers).await });
        let (leave, submit) = (leave.await.unwrap(), submit.await.unwrap());

        let latest = app
            .store
            .snapshot(&AttemptKey::new(student, quiz_id))
            .await
            .unwrap()
            .latest
            .unwrap();
        assert!(latest.completed_at.is_some());

        match submit {
            // submit won: the leave saw a closed attempt and changed nothing
            Ok(receipt) => {
                assert_eq!(receipt.score, 20);
                assert!(!latest.is_blocked);
                assert_eq!(latest.score, Some(20));
                assert!(!leave.unwrap().is_blocked);
            }
            Err(err) => {
                assert!(matches!(err, Error::AlreadySubmitted));
                assert!(latest.is_blocked);
                assert_eq!(latest.score, Some(0));
                assert!(leave.unwrap().is_blocked);
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn threshold_warning_racing_submit_never_mixes_outcomes() {
    for _ in 0..20 {
        let app = TestApp::new(two_question_quiz(1, 10));
        let (student, quiz_id) = (app.student, app.quiz.id);
        app.state
            .admission_service
            .request_attempt(student, quiz_id)
            .await
            .unwrap();
        for _ in 0..2 {
            app.state
                .integrity_service
                .record_event(student, quiz_id, ViolationKind::Warning)
                .await
                .unwrap();
        }

        let integrity = app.state.integrity_service.clone();
        let submission = app.state.submission_service.clone();
        let answers = vec![pick(&app.quiz, 0, 0)];
        let warn = tokio::spawn(async move {
            integrity
                .record_event(student, quiz_id, ViolationKind::Warning)
                .await
        });
        let submit = tokio::spawn(async move { submission.submit(student, quiz_id, answers).await });
        let _ = warn.await.unwrap();
        let _ = submit.await.unwrap();

        let latest = app
            .store
            .snapshot(&AttemptKey::new(student, quiz_id))
            .await
            .unwrap()
            .latest
            .unwrap();
        if latest.is_blocked {
            assert_eq!((latest.warnings, latest.score), (3, Some(0)));
        } else {
            assert_eq!((latest.warnings, latest.score), (2, Some(10)));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_warnings_are_counted_exactly() {
    let app = TestApp::new(two_question_quiz(1, 10));
    let (student, quiz_id) = (app.student, app.quiz.id);
    app.state
        .admission_service
        .request_attempt(student, quiz_id)
        .await
        .unwrap();

    let handles = (0..2).map(|_| {
        let svc = app.state.integrity_service.clone();
        tokio::spawn(async move {
            svc.record_event(student, quiz_id, ViolationKind::Warning)
                .await
        })
    });
    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    let latest = app
        .store
        .snapshot(&AttemptKey::new(student, quiz_id))
        .await
        .unwrap()
        .latest
        .unwrap();
    assert_eq!(latest.warnings, 2);
    assert!(latest.completed_at.is_none());
}
