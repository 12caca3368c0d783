use anyhow::Context;
use lms_core::builder::{Course, CourseBuilder, ModuleKind, ModulePatch};
use lms_core::model::UserId;
use lms_core::tracking::VideoTracker;
use serde_json::json;
use services::{AppServices, NewH5pContent};
use storage::repository::{NewUserRecord, Storage};
use tracing::info;

const DEMO_USERNAME: &str = "demo.student";

/// Populate a database with enough data for the dashboard to show something.
pub async fn seed(storage: &Storage, app: &AppServices) -> anyhow::Result<()> {
    let user_id = demo_user(storage, app).await?;

    let mut builder = CourseBuilder::new(Course {
        id: "demo-labour-law".into(),
        title: "Advanced Labour Law".into(),
        description: "Collective bargaining and workplace rights".into(),
        category: "law".into(),
        modules: Vec::new(),
    });
    let video_id = builder.add_module(ModuleKind::Video).id.clone();
    builder.update_module(
        &video_id,
        ModulePatch {
            title: Some("Introduction".into()),
            duration: Some(12),
            ..ModulePatch::default()
        },
    )?;
    let quiz_id = builder.add_module(ModuleKind::Quiz).id.clone();
    builder.update_module(
        &quiz_id,
        ModulePatch {
            title: Some("Checkpoint".into()),
            duration: Some(10),
            ..ModulePatch::default()
        },
    )?;
    let course = app
        .courses()
        .create(builder.course().clone(), Some(user_id), true)
        .await
        .context("creating demo course")?;

    app.h5p()
        .create(NewH5pContent {
            title: "Rights at work".into(),
            content_type: "H5P.DragText".into(),
            parameters: Some(json!({ "textField": "Workers may *organise* and *strike*." })),
            tracking: true,
            author_id: Some(user_id),
            ..NewH5pContent::default()
        })
        .await
        .context("creating demo H5P content")?;

    let mut learner = app
        .learner_session(user_id, course.id)
        .await
        .context("opening learner session")?;
    let mut video = VideoTracker::new(video_id);
    learner.drive(|s| {
        video.play(s);
        video.time_update(300.0, 720.0, s)
    })?;
    learner.persist().await.context("saving demo ledger")?;

    let progress = video.progress() / 2.0;
    app.progress()
        .record_progress(user_id, course.id, progress)
        .await
        .context("recording demo enrollment")?;

    info!(course_id = %course.id, %user_id, "seeded demo data");
    Ok(())
}

async fn demo_user(storage: &Storage, app: &AppServices) -> anyhow::Result<UserId> {
    if let Some(existing) = storage.users.find_user_by_username(DEMO_USERNAME).await? {
        return Ok(existing.id);
    }
    let user = storage
        .users
        .insert_user(
            NewUserRecord {
                username: DEMO_USERNAME.into(),
                // Login disabled for the demo account.
                password_hash: "!".into(),
                name: "Demo Student".into(),
                email: "demo.student@example.com".into(),
                role: "student".into(),
            },
            app.clock().now(),
        )
        .await
        .context("creating demo user")?;
    Ok(user.id)
}
