//! Dashboard read views composed from the statistics and ranking engines.
//!
//! Every function here is pure over a [`Snapshot`]; [`load_dashboard`] is the
//! only entry point that touches storage, and it recomputes on each call.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::grades;
use crate::models::{
    DashboardAnalytics, DashboardCounts, Exam, ExamWithStats, Grade, RecentExam, Student,
    StudentWithGrades,
};
use crate::ranking;
use crate::stats;
use crate::store::{GradeFilter, GradeStore};

/// How many exams the dashboard lists under "recent exams".
pub const RECENT_EXAMS_LIMIT: usize = 5;

/// Students, exams and grades fetched together before any computation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub exams: Vec<Exam>,
    pub grades: Vec<Grade>,
}

impl Snapshot {
    pub async fn load(store: &dyn GradeStore) -> Result<Self> {
        let students = store.list_students().await?;
        let exams = store.list_exams().await?;
        let grades = store.list_grades(GradeFilter::all()).await?;
        debug!(
            students = students.len(),
            exams = exams.len(),
            grades = grades.len(),
            "snapshot loaded"
        );

        Ok(Self {
            students,
            exams,
            grades,
        })
    }

    pub fn exam(&self, exam_id: Uuid) -> Option<&Exam> {
        self.exams.iter().find(|exam| exam.id == exam_id)
    }

    /// Grades on `exam_id`, or every grade when no exam is given.
    pub fn grades_in_scope(&self, exam_id: Option<Uuid>) -> Vec<Grade> {
        self.grades
            .iter()
            .filter(|grade| exam_id.map_or(true, |id| grade.exam_id == id))
            .cloned()
            .collect()
    }

    pub fn student_ranking(&self, exam_id: Option<Uuid>) -> Vec<StudentWithGrades> {
        ranking::student_ranking(&self.students, &self.exams, &self.grades, exam_id)
    }

    pub fn exam_ranking(&self) -> Vec<ExamWithStats> {
        ranking::exam_ranking(&self.exams, &self.grades)
    }
}

pub fn dashboard_analytics(snapshot: &Snapshot, exam_id: Option<Uuid>) -> DashboardAnalytics {
    let scoped = snapshot.grades_in_scope(exam_id);

    DashboardAnalytics {
        exam_id,
        counts: DashboardCounts {
            registered_students: snapshot.students.len(),
            students_with_grades: ranking::distinct_matricole(&scoped).len(),
            exams: snapshot.exams.len(),
            grades: scoped.len(),
        },
        stats: stats::calculate_stats(&scoped),
        recent_exams: recent_exams(snapshot, RECENT_EXAMS_LIMIT),
    }
}

/// Most recent exams first, each with its own stats.
pub fn recent_exams(snapshot: &Snapshot, limit: usize) -> Vec<RecentExam> {
    let mut exams = snapshot.exams.clone();
    exams.sort_by(|a, b| b.date.cmp(&a.date));

    exams
        .into_iter()
        .take(limit)
        .map(|exam| RecentExam {
            stats: stats::exam_stats(&snapshot.grades, exam.id),
            exam,
        })
        .collect()
}

/// A student's grades with exam details, newest exam first, and the
/// passing-only average. Works for unregistered matricole that have grades.
pub fn student_details(snapshot: &Snapshot, matricola: &str) -> Option<StudentWithGrades> {
    let student = snapshot
        .students
        .iter()
        .find(|student| student.matricola == matricola)
        .cloned();
    let records: Vec<&Grade> = snapshot
        .grades
        .iter()
        .filter(|grade| grade.matricola == matricola)
        .collect();
    if student.is_none() && records.is_empty() {
        return None;
    }

    let exams_by_id: HashMap<Uuid, &Exam> =
        snapshot.exams.iter().map(|exam| (exam.id, exam)).collect();
    let mut joined = ranking::join_exams(&records, &exams_by_id);
    joined.sort_by(|a, b| b.exam.date.cmp(&a.exam.date));

    Some(StudentWithGrades {
        matricola: matricola.to_string(),
        student,
        average: grades::passing_average(records.iter().copied()),
        grades: joined,
    })
}

pub async fn load_dashboard(
    store: &dyn GradeStore,
    exam_id: Option<Uuid>,
) -> Result<DashboardAnalytics> {
    let snapshot = Snapshot::load(store).await?;
    Ok(dashboard_analytics(&snapshot, exam_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExamKind, GradeValue, LetterGrade, NewExam, NewGrade, NewStudent};
    use crate::store::LocalStore;
    use chrono::NaiveDate;

    fn exam(name: &str, day: u32) -> Exam {
        Exam {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: ExamKind::Intermediate,
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            use_letter_grades: false,
        }
    }

    fn numeric(matricola: &str, exam: &Exam, value: i32) -> Grade {
        Grade {
            id: Uuid::new_v4(),
            matricola: matricola.to_string(),
            exam_id: exam.id,
            value: Some(GradeValue::numeric(value)),
        }
    }

    fn sample() -> (Snapshot, Exam, Exam) {
        let first = exam("Analisi I - prova intermedia", 3);
        let second = exam("Analisi I - prova finale", 28);
        let snapshot = Snapshot {
            students: vec![Student {
                id: Uuid::new_v4(),
                matricola: "M1".to_string(),
                first_name: "Giovanni".to_string(),
                last_name: "Verdi".to_string(),
            }],
            grades: vec![
                numeric("M1", &first, 16),
                numeric("M1", &second, 27),
                numeric("M2", &first, 22),
            ],
            exams: vec![first.clone(), second.clone()],
        };
        (snapshot, first, second)
    }

    #[test]
    fn global_dashboard_counts_everything() {
        let (snapshot, _, _) = sample();
        let analytics = dashboard_analytics(&snapshot, None);

        assert_eq!(analytics.counts.registered_students, 1);
        assert_eq!(analytics.counts.students_with_grades, 2);
        assert_eq!(analytics.counts.exams, 2);
        assert_eq!(analytics.counts.grades, 3);
        assert_eq!(analytics.stats.passing, 2);
        assert_eq!(analytics.stats.average, 24.5);
    }

    #[test]
    fn exam_scope_narrows_counts_and_stats() {
        let (snapshot, first, _) = sample();
        let analytics = dashboard_analytics(&snapshot, Some(first.id));

        assert_eq!(analytics.exam_id, Some(first.id));
        assert_eq!(analytics.counts.grades, 2);
        assert_eq!(analytics.counts.students_with_grades, 2);
        assert_eq!(analytics.counts.exams, 2);
        assert_eq!(analytics.stats.average, 22.0);
        assert_eq!(analytics.stats.passing_percentage, 50.0);
    }

    #[test]
    fn recent_exams_are_newest_first() {
        let (snapshot, first, second) = sample();
        let recent = recent_exams(&snapshot, 5);

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].exam.id, second.id);
        assert_eq!(recent[0].stats.grade_count, 1);
        assert_eq!(recent[1].exam.id, first.id);
        assert_eq!(recent_exams(&snapshot, 1).len(), 1);
    }

    #[test]
    fn student_details_cover_registered_and_unregistered() {
        let (snapshot, _, second) = sample();

        let registered = student_details(&snapshot, "M1").unwrap();
        assert_eq!(registered.display_name(), "Giovanni Verdi");
        assert_eq!(registered.grades.len(), 2);
        assert_eq!(registered.grades[0].exam.id, second.id);
        assert_eq!(registered.average, 27.0);

        let unregistered = student_details(&snapshot, "M2").unwrap();
        assert!(unregistered.student.is_none());
        assert_eq!(unregistered.average, 22.0);

        assert!(student_details(&snapshot, "M9").is_none());
    }

    #[tokio::test]
    async fn load_dashboard_reads_through_the_store() {
        let store = LocalStore::in_memory();
        let exam = store
            .add_exam(NewExam {
                name: "Logica".to_string(),
                kind: ExamKind::Full,
                date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                use_letter_grades: true,
            })
            .await
            .unwrap();
        store
            .add_student(NewStudent {
                matricola: "0612710901".to_string(),
                first_name: "Marco".to_string(),
                last_name: "Rossi".to_string(),
            })
            .await
            .unwrap();
        for letter in [LetterGrade::A, LetterGrade::F] {
            store
                .add_grade(NewGrade {
                    matricola: "0612710901".to_string(),
                    exam_id: exam.id,
                    value: GradeValue::Letter(letter),
                })
                .await
                .unwrap();
        }

        let analytics = load_dashboard(&store, Some(exam.id)).await.unwrap();
        assert_eq!(analytics.counts.grades, 2);
        assert_eq!(analytics.stats.average, 30.0);
        assert_eq!(analytics.stats.passing_percentage, 50.0);
        assert_eq!(analytics.recent_exams.len(), 1);
    }
}
