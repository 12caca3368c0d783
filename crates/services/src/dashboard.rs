//! Aggregate metrics for the admin dashboard.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lms_core::model::{CourseId, LessonStatus};
use serde::Serialize;
use storage::repository::{
    CourseRecord, CourseRepository, EnrollmentRecord, EnrollmentRepository, ScormRecord,
    ScormRepository,
};
use tracing::debug;

use crate::error::DashboardError;

const RECENT_SCORM_ITEMS: usize = 5;
const RECENT_ENROLLMENT_ITEMS: usize = 3;
const RECENT_ACTIVITY_LIMIT: usize = 5;
const TOP_COURSES_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Completed,
    Progress,
    Enrolled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: i64,
    pub student: String,
    pub course: String,
    pub action: ActivityAction,
    pub timestamp: DateTime<Utc>,
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCourse {
    pub id: CourseId,
    pub name: String,
    pub students: usize,
    /// Rounded mean enrollment progress.
    pub completion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProgress {
    /// `YYYY-MM`.
    pub month: String,
    pub enrollments: usize,
    pub completions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_courses: usize,
    pub active_courses: usize,
    pub total_students: usize,
    pub active_students: usize,
    pub completion_rate: u32,
    pub average_progress: u32,
    pub total_modules: usize,
    pub completed_modules: usize,
    pub recent_activity: Vec<ActivityItem>,
    pub top_courses: Vec<TopCourse>,
    pub monthly_progress: Vec<MonthlyProgress>,
}

#[derive(Clone)]
pub struct DashboardService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    scorm: Arc<dyn ScormRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        scorm: Arc<dyn ScormRepository>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            scorm,
        }
    }

    /// Compute the dashboard from current storage contents.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Storage` if any repository read fails.
    pub async fn dashboard(&self) -> Result<DashboardMetrics, DashboardError> {
        let courses = self.courses.list_courses().await?;
        let enrollments = self.enrollments.list_enrollments().await?;
        let scorm = self.scorm.recent_scorm(u32::MAX).await?;
        debug!(
            courses = courses.len(),
            enrollments = enrollments.len(),
            scorm = scorm.len(),
            "computing dashboard"
        );
        Ok(compute(&courses, &enrollments, &scorm))
    }
}

/// Pure computation over already-loaded rows. Inputs are expected newest first.
#[must_use]
pub fn compute(
    courses: &[CourseRecord],
    enrollments: &[EnrollmentRecord],
    scorm: &[ScormRecord],
) -> DashboardMetrics {
    let titles: HashMap<CourseId, &str> =
        courses.iter().map(|c| (c.id, c.title.as_str())).collect();
    let completed = enrollments
        .iter()
        .filter(|e| e.completed_at.is_some())
        .count();

    DashboardMetrics {
        total_courses: courses.len(),
        active_courses: courses.iter().filter(|c| c.published).count(),
        total_students: enrollments
            .iter()
            .map(|e| e.user_id)
            .collect::<HashSet<_>>()
            .len(),
        active_students: scorm.iter().map(|s| s.user_id).collect::<HashSet<_>>().len(),
        completion_rate: ratio_percent(completed, enrollments.len()),
        average_progress: mean_percent(enrollments.iter().map(|e| e.progress)),
        total_modules: scorm.len(),
        completed_modules: scorm
            .iter()
            .filter(|s| {
                matches!(
                    s.lesson_status,
                    LessonStatus::Completed | LessonStatus::Passed
                )
            })
            .count(),
        recent_activity: recent_activity(&titles, enrollments, scorm),
        top_courses: top_courses(courses, enrollments),
        monthly_progress: monthly_progress(enrollments),
    }
}

fn course_label(titles: &HashMap<CourseId, &str>, id: CourseId) -> String {
    titles
        .get(&id)
        .map_or_else(|| format!("Course {id}"), |t| (*t).to_owned())
}

fn recent_activity(
    titles: &HashMap<CourseId, &str>,
    enrollments: &[EnrollmentRecord],
    scorm: &[ScormRecord],
) -> Vec<ActivityItem> {
    let from_scorm = scorm.iter().take(RECENT_SCORM_ITEMS).map(|s| ActivityItem {
        id: s.id,
        student: format!("User {}", s.user_id),
        course: course_label(titles, s.course_id),
        action: if matches!(
            s.lesson_status,
            LessonStatus::Completed | LessonStatus::Passed
        ) {
            ActivityAction::Completed
        } else {
            ActivityAction::Progress
        },
        timestamp: s.updated_at,
        progress: clamp_percent(s.score.raw),
    });
    let from_enrollments = enrollments
        .iter()
        .take(RECENT_ENROLLMENT_ITEMS)
        .map(|e| ActivityItem {
            id: e.id,
            student: format!("User {}", e.user_id),
            course: course_label(titles, e.course_id),
            action: if e.completed_at.is_some() {
                ActivityAction::Completed
            } else {
                ActivityAction::Enrolled
            },
            timestamp: e.enrolled_at,
            progress: clamp_percent(e.progress),
        });
    from_scorm
        .chain(from_enrollments)
        .take(RECENT_ACTIVITY_LIMIT)
        .collect()
}

fn top_courses(courses: &[CourseRecord], enrollments: &[EnrollmentRecord]) -> Vec<TopCourse> {
    let mut ranked: Vec<TopCourse> = courses
        .iter()
        .map(|course| {
            let mine: Vec<f64> = enrollments
                .iter()
                .filter(|e| e.course_id == course.id)
                .map(|e| e.progress)
                .collect();
            TopCourse {
                id: course.id,
                name: course.title.clone(),
                students: mine.len(),
                completion_rate: mean_percent(mine.into_iter()),
            }
        })
        .collect();
    // Stable: ties keep catalogue order.
    ranked.sort_by(|a, b| b.students.cmp(&a.students));
    ranked.truncate(TOP_COURSES_LIMIT);
    ranked
}

fn monthly_progress(enrollments: &[EnrollmentRecord]) -> Vec<MonthlyProgress> {
    let mut months: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for e in enrollments {
        months
            .entry(e.enrolled_at.format("%Y-%m").to_string())
            .or_default()
            .0 += 1;
        if let Some(done) = e.completed_at {
            months
                .entry(done.format("%Y-%m").to_string())
                .or_default()
                .1 += 1;
        }
    }
    months
        .into_iter()
        .map(|(month, (enrollments, completions))| MonthlyProgress {
            month,
            enrollments,
            completions,
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_percent(value: f64) -> u32 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u32
    } else {
        0
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio_percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    clamp_percent(part as f64 / whole as f64 * 100.0)
}

#[allow(clippy::cast_precision_loss)]
fn mean_percent(values: impl Iterator<Item = f64>) -> u32 {
    let (sum, n) = values.fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return 0;
    }
    clamp_percent(sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};
    use lms_core::model::{Score, UserId};

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap()
    }

    fn course(id: u64, title: &str, published: bool) -> CourseRecord {
        CourseRecord {
            id: CourseId::new(id),
            title: title.into(),
            description: None,
            content: None,
            author_id: None,
            published,
            created_at: at(1, 1),
            updated_at: at(1, 1),
        }
    }

    fn enrollment(
        id: i64,
        user: u64,
        course: u64,
        progress: f64,
        enrolled: DateTime<Utc>,
    ) -> EnrollmentRecord {
        EnrollmentRecord {
            id,
            user_id: UserId::new(user),
            course_id: CourseId::new(course),
            progress,
            enrolled_at: enrolled,
            completed_at: (progress >= 100.0).then_some(enrolled + Duration::days(40)),
        }
    }

    fn scorm(id: i64, user: u64, course: u64, status: LessonStatus, raw: f64) -> ScormRecord {
        ScormRecord {
            id,
            user_id: UserId::new(user),
            course_id: CourseId::new(course),
            lesson_status: status,
            score: Score {
                raw,
                min: 0.0,
                max: 100.0,
            },
            session_time: Duration::zero(),
            total_time: Duration::zero(),
            location: String::new(),
            suspend_data: String::new(),
            interactions: Vec::new(),
            objectives: Vec::new(),
            created_at: at(3, 1),
            updated_at: at(3, 1),
        }
    }

    #[test]
    fn empty_storage_yields_zeroes() {
        let metrics = compute(&[], &[], &[]);
        assert_eq!(metrics.total_courses, 0);
        assert_eq!(metrics.completion_rate, 0);
        assert_eq!(metrics.average_progress, 0);
        assert!(metrics.recent_activity.is_empty());
        assert!(metrics.monthly_progress.is_empty());
    }

    #[test]
    fn aggregates_courses_enrollments_and_scorm() {
        let courses = [course(1, "Labour Law", true), course(2, "Contracts", false)];
        let enrollments = [
            enrollment(3, 7, 2, 100.0, at(2, 10)),
            enrollment(2, 8, 2, 50.0, at(2, 5)),
            enrollment(1, 7, 1, 25.0, at(1, 20)),
        ];
        let rows = [
            scorm(2, 7, 1, LessonStatus::Passed, 88.4),
            scorm(1, 9, 3, LessonStatus::Incomplete, 10.0),
        ];
        let m = compute(&courses, &enrollments, &rows);

        assert_eq!(m.total_courses, 2);
        assert_eq!(m.active_courses, 1);
        assert_eq!(m.total_students, 2);
        assert_eq!(m.active_students, 2);
        assert_eq!(m.completion_rate, 33);
        assert_eq!(m.average_progress, 58);
        assert_eq!(m.total_modules, 2);
        assert_eq!(m.completed_modules, 1);

        assert_eq!(m.recent_activity.len(), 5);
        assert_eq!(m.recent_activity[0].action, ActivityAction::Completed);
        assert_eq!(m.recent_activity[0].course, "Labour Law");
        assert_eq!(m.recent_activity[0].progress, 88);
        assert_eq!(m.recent_activity[1].course, "Course 3");
        assert_eq!(m.recent_activity[2].student, "User 7");
        assert_eq!(m.recent_activity[3].action, ActivityAction::Enrolled);

        assert_eq!(m.top_courses[0].name, "Contracts");
        assert_eq!(m.top_courses[0].students, 2);
        assert_eq!(m.top_courses[0].completion_rate, 75);

        let months: Vec<&str> = m.monthly_progress.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, ["2024-01", "2024-02", "2024-03"]);
        assert_eq!(m.monthly_progress[1].enrollments, 2);
        assert_eq!(m.monthly_progress[2].completions, 1);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(compute(&[], &[], &[])).unwrap();
        assert!(json.get("totalCourses").is_some());
        assert!(json.get("monthlyProgress").is_some());
    }
}
