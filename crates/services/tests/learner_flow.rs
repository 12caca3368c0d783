use chrono::Duration;
use lms_core::builder::{Course, CourseBuilder, ModuleKind};
use lms_core::model::{LessonStatus, UserId};
use lms_core::time::fixed_now;
use lms_core::tracking::VideoTracker;
use services::{ActivityAction, AppServices, Clock, NewH5pContent};

#[tokio::test]
async fn video_lesson_flows_into_dashboard() {
    let app = AppServices::new_sqlite(
        "sqlite:file:memdb_learner_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
    )
    .await
    .expect("sqlite services");

    let mut builder = CourseBuilder::new(Course {
        id: "draft-1".into(),
        title: "Labour Law".into(),
        description: "Rights at work".into(),
        category: "law".into(),
        modules: Vec::new(),
    });
    let video_id = builder.add_module(ModuleKind::Video).id.clone();
    let course = app
        .courses()
        .create(builder.course().clone(), None, true)
        .await
        .unwrap();

    let learner_id = UserId::new(7);
    let mut learner = app.learner_session(learner_id, course.id).await.unwrap();
    let mut video = VideoTracker::new(video_id.clone());
    learner.drive(|s| {
        video.play(s);
        video.time_update(95.0, 100.0, s)
    })
    .unwrap();
    assert!(video.is_completed());
    assert_eq!(learner.toasts()[0].title, "Module completed");

    learner
        .session_mut()
        .clock_mut()
        .advance(Duration::minutes(3));
    let saved = learner.persist().await.unwrap();
    assert_eq!(saved.lesson_status, LessonStatus::Completed);
    assert_eq!(saved.location, video_id.as_str());
    assert_eq!(saved.session_time, Duration::minutes(3));

    app.progress()
        .record_progress(learner_id, course.id, 100.0)
        .await
        .unwrap();
    let progress = app.progress().course_progress(learner_id).await.unwrap();
    assert_eq!(progress[0].course_title.as_deref(), Some("Labour Law"));

    let metrics = app.dashboard().dashboard().await.unwrap();
    assert_eq!(metrics.total_courses, 1);
    assert_eq!(metrics.active_courses, 1);
    assert_eq!(metrics.active_students, 1);
    assert_eq!(metrics.completion_rate, 100);
    assert_eq!(metrics.completed_modules, 1);
    assert_eq!(metrics.recent_activity[0].action, ActivityAction::Completed);
    assert_eq!(metrics.top_courses[0].students, 1);

    let resumed = app.learner_session(learner_id, course.id).await.unwrap();
    assert_eq!(resumed.session().ledger(), learner.session().ledger());
    assert_eq!(
        resumed.session().ledger().location(),
        &video_id
    );
}

#[tokio::test]
async fn h5p_content_is_listed_after_creation() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    app.h5p()
        .create(NewH5pContent {
            title: "Drag the words".into(),
            content_type: "H5P.DragText".into(),
            tracking: true,
            ..NewH5pContent::default()
        })
        .await
        .unwrap();
    let items = app.h5p().list().await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].tracking);
}
