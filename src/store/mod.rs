use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Exam, Grade, NewExam, NewGrade, NewStudent, Student};

pub mod local;
pub mod postgres;
pub mod validate;

pub use local::LocalStore;
pub use postgres::PgStore;

/// Narrows `list_grades`. Backends may push the filter down; a full scan
/// followed by [`GradeFilter::matches`] must give the same result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeFilter {
    pub matricola: Option<String>,
    pub exam_id: Option<Uuid>,
}

impl GradeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_exam(exam_id: Uuid) -> Self {
        Self {
            exam_id: Some(exam_id),
            ..Self::default()
        }
    }

    pub fn by_matricola(matricola: impl Into<String>) -> Self {
        Self {
            matricola: Some(matricola.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, grade: &Grade) -> bool {
        self.matricola
            .as_deref()
            .map_or(true, |matricola| grade.matricola == matricola)
            && self.exam_id.map_or(true, |exam_id| grade.exam_id == exam_id)
    }
}

/// Storage collaborator behind the analytics core.
///
/// Writes validate their input and cascade deletes; reads return owned snapshots.
#[async_trait]
pub trait GradeStore: Send + Sync {
    async fn list_students(&self) -> Result<Vec<Student>>;
    async fn list_exams(&self) -> Result<Vec<Exam>>;
    async fn list_grades(&self, filter: GradeFilter) -> Result<Vec<Grade>>;

    async fn add_student(&self, student: NewStudent) -> Result<Student>;
    async fn update_student(&self, student: Student) -> Result<Student>;
    /// Also removes every grade carrying the student's matricola.
    async fn delete_student(&self, id: Uuid) -> Result<()>;

    async fn add_exam(&self, exam: NewExam) -> Result<Exam>;
    async fn update_exam(&self, exam: Exam) -> Result<Exam>;
    /// Also removes every grade on the exam.
    async fn delete_exam(&self, id: Uuid) -> Result<()>;

    /// Accepts matricole with no registered student.
    async fn add_grade(&self, grade: NewGrade) -> Result<Grade>;
    async fn update_grade(&self, grade: Grade) -> Result<Grade>;
    async fn delete_grade(&self, id: Uuid) -> Result<()>;
}
