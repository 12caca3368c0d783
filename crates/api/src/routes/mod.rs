pub mod courses;
pub mod dashboard;
pub mod h5p;
pub mod progress;
pub mod scorm;
