#![forbid(unsafe_code)]

pub mod app_services;
pub mod course_service;
pub mod dashboard;
pub mod error;
pub mod h5p_service;
pub mod learner_session;
pub mod progress_service;
pub mod tracking_service;

pub use lms_core::Clock;

pub use app_services::AppServices;
pub use course_service::CourseService;
pub use dashboard::{
    ActivityAction, ActivityItem, DashboardMetrics, DashboardService, MonthlyProgress, TopCourse,
};
pub use error::{
    AppServicesError, CourseServiceError, DashboardError, H5pServiceError, LearnerSessionError,
    ProgressError, TrackingError,
};
pub use h5p_service::{H5pService, NewH5pContent};
pub use learner_session::LearnerSession;
pub use progress_service::ProgressService;
pub use tracking_service::{RECENT_SCORM_LIMIT, ScormTrackingService};
