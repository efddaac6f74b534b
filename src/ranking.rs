use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::grades;
use crate::models::{Exam, ExamWithStats, Grade, GradeWithExam, Student, StudentWithGrades};
use crate::stats;

/// Leaderboard of every matricola that appears in `grades`, registered or not.
///
/// With `exam_id` the ranking value is the student's own grade on that exam;
/// without it, the passing-only average across all exams. Rows whose value is
/// zero are dropped. Ties keep the order in which matricole first appear.
pub fn student_ranking(
    students: &[Student],
    exams: &[Exam],
    grades: &[Grade],
    exam_id: Option<Uuid>,
) -> Vec<StudentWithGrades> {
    let exams_by_id: HashMap<Uuid, &Exam> = exams.iter().map(|exam| (exam.id, exam)).collect();
    let mut ranking = Vec::new();

    for matricola in distinct_matricole(grades) {
        let scoped: Vec<&Grade> = grades
            .iter()
            .filter(|grade| grade.matricola == matricola)
            .filter(|grade| exam_id.map_or(true, |id| grade.exam_id == id))
            .collect();
        if scoped.is_empty() {
            continue;
        }

        let average = match exam_id {
            Some(_) => scoped.first().map_or(0.0, |grade| grades::numeric_value(grade)),
            None => grades::passing_average(scoped.iter().copied()),
        };
        if average == 0.0 {
            continue;
        }

        ranking.push(StudentWithGrades {
            student: students
                .iter()
                .find(|student| student.matricola == matricola)
                .cloned(),
            grades: join_exams(&scoped, &exams_by_id),
            matricola: matricola.to_string(),
            average,
        });
    }

    ranking.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));
    ranking
}

/// Every exam with its stats and distinct student count, best average first.
/// Exams without grades stay in the list with a zero average.
pub fn exam_ranking(exams: &[Exam], grades: &[Grade]) -> Vec<ExamWithStats> {
    let mut ranking: Vec<ExamWithStats> = exams
        .iter()
        .map(|exam| {
            let exam_grades: Vec<Grade> = grades
                .iter()
                .filter(|grade| grade.exam_id == exam.id)
                .cloned()
                .collect();
            let student_count = exam_grades
                .iter()
                .map(|grade| grade.matricola.as_str())
                .collect::<HashSet<_>>()
                .len();

            ExamWithStats {
                exam: exam.clone(),
                stats: stats::calculate_stats(&exam_grades),
                student_count,
            }
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.stats
            .average
            .partial_cmp(&a.stats.average)
            .unwrap_or(Ordering::Equal)
    });
    ranking
}

/// Matricole in the order they first appear in `grades`.
pub fn distinct_matricole(grades: &[Grade]) -> Vec<&str> {
    let mut seen = HashSet::new();
    grades
        .iter()
        .map(|grade| grade.matricola.as_str())
        .filter(|matricola| seen.insert(*matricola))
        .collect()
}

/// Joins grades with their exams, dropping grades whose exam no longer exists.
pub(crate) fn join_exams(
    grades: &[&Grade],
    exams_by_id: &HashMap<Uuid, &Exam>,
) -> Vec<GradeWithExam> {
    grades
        .iter()
        .filter_map(|grade| {
            exams_by_id.get(&grade.exam_id).map(|exam| GradeWithExam {
                grade: (*grade).clone(),
                exam: (*exam).clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExamKind, GradeValue, LetterGrade};
    use chrono::NaiveDate;

    fn exam(name: &str, use_letter_grades: bool) -> Exam {
        Exam {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: ExamKind::Full,
            date: NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
            use_letter_grades,
        }
    }

    fn student(matricola: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            matricola: matricola.to_string(),
            first_name: "Marco".to_string(),
            last_name: "Rossi".to_string(),
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

    #[test]
    fn global_ranking_hides_students_without_passing_grades() {
        let analisi = exam("Analisi I", false);
        let students = vec![student("M1"), student("M2"), student("M3")];
        let grades = vec![numeric("M1", &analisi, 25), numeric("M2", &analisi, 15)];

        let ranking = student_ranking(&students, &[analisi], &grades, None);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].matricola, "M1");
        assert_eq!(ranking[0].average, 25.0);
    }

    #[test]
    fn exam_scope_uses_the_grade_on_that_exam() {
        let exam_a = exam("Fisica", false);
        let exam_b = exam("Chimica", false);
        let grades = vec![numeric("M1", &exam_a, 20), numeric("M1", &exam_b, 30)];
        let exams = vec![exam_a.clone(), exam_b];

        let scoped = student_ranking(&[], &exams, &grades, Some(exam_a.id));
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].average, 20.0);
        assert_eq!(scoped[0].grades.len(), 1);

        let global = student_ranking(&[], &exams, &grades, None);
        assert_eq!(global[0].average, 25.0);
    }

    #[test]
    fn unregistered_matricole_are_ranked_as_placeholders() {
        let fisica = exam("Fisica", false);
        let students = vec![student("M1")];
        let grades = vec![numeric("M1", &fisica, 19), numeric("X9", &fisica, 28)];

        let ranking = student_ranking(&students, &[fisica], &grades, None);
        assert_eq!(ranking[0].matricola, "X9");
        assert!(ranking[0].student.is_none());
        assert_eq!(ranking[0].display_name(), "Non registrato");
        assert_eq!(ranking[1].display_name(), "Marco Rossi");
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let fisica = exam("Fisica", false);
        let grades = vec![
            numeric("M3", &fisica, 24),
            numeric("M1", &fisica, 27),
            numeric("M2", &fisica, 24),
        ];

        let ranking = student_ranking(&[], &[fisica], &grades, None);
        let order: Vec<&str> = ranking.iter().map(|row| row.matricola.as_str()).collect();
        assert_eq!(order, vec!["M1", "M3", "M2"]);
    }

    #[test]
    fn letter_f_on_scoped_exam_is_excluded() {
        let logica = exam("Logica", true);
        let grades = vec![Grade {
            id: Uuid::new_v4(),
            matricola: "M1".to_string(),
            exam_id: logica.id,
            value: Some(GradeValue::Letter(LetterGrade::F)),
        }];

        assert!(student_ranking(&[], &[logica.clone()], &grades, Some(logica.id)).is_empty());
    }

    #[test]
    fn exam_ranking_sorts_by_average_with_empty_exams_last() {
        let empty = exam("Vuoto", false);
        let weak = exam("Algebra", false);
        let strong = exam("Geometria", false);
        let grades = vec![
            numeric("M1", &weak, 19),
            numeric("M2", &weak, 10),
            numeric("M1", &strong, 29),
            numeric("M1", &strong, 27),
        ];
        let exams = vec![empty.clone(), weak.clone(), strong.clone()];

        let ranking = exam_ranking(&exams, &grades);
        let names: Vec<&str> = ranking.iter().map(|row| row.exam.name.as_str()).collect();
        assert_eq!(names, vec!["Geometria", "Algebra", "Vuoto"]);
        assert_eq!(ranking[0].student_count, 1);
        assert_eq!(ranking[1].student_count, 2);
        assert_eq!(ranking[2].stats.average, 0.0);
        assert_eq!(ranking[2].student_count, 0);
    }

    #[test]
    fn exam_ranking_ties_keep_input_order() {
        let first = exam("Primo", false);
        let second = exam("Secondo", false);
        let exams = vec![first, second];

        let ranking = exam_ranking(&exams, &[]);
        assert_eq!(ranking[0].exam.name, "Primo");
        assert_eq!(ranking[1].exam.name, "Secondo");
    }
}
