use chrono::Utc;
use tracing::info;

use crate::error::Result;
use crate::models::{ExamKind, GradeValue, LetterGrade, NewExam, NewGrade, NewStudent};
use crate::store::GradeStore;

const SAMPLE_STUDENTS: [(&str, &str, &str); 3] = [
    ("0612710901", "Marco", "Rossi"),
    ("0612710902", "Lucia", "Bianchi"),
    ("0612710903", "Giovanni", "Verdi"),
];

const SAMPLE_EXAMS: [(&str, bool); 3] = [
    ("Programmazione - Prova finale", true),
    ("Matematica Discreta - Primo appello", true),
    ("Fisica - Computo finale", false),
];

/// Loads a small demo dataset. Does nothing once the store has any student or exam.
/// Returns whether data was inserted.
pub async fn load_sample_data(store: &dyn GradeStore) -> Result<bool> {
    if !store.list_students().await?.is_empty() || !store.list_exams().await?.is_empty() {
        info!("store already populated, skipping sample data");
        return Ok(false);
    }

    let today = Utc::now().date_naive();
    for (matricola, first_name, last_name) in SAMPLE_STUDENTS {
        store
            .add_student(NewStudent {
                matricola: matricola.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            })
            .await?;
    }

    for (name, use_letter_grades) in SAMPLE_EXAMS {
        let exam = store
            .add_exam(NewExam {
                name: name.to_string(),
                kind: ExamKind::Full,
                date: today,
                use_letter_grades,
            })
            .await?;

        for (index, (matricola, _, _)) in SAMPLE_STUDENTS.iter().enumerate() {
            store
                .add_grade(NewGrade {
                    matricola: matricola.to_string(),
                    exam_id: exam.id,
                    value: sample_value(use_letter_grades, index),
                })
                .await?;
        }
    }

    info!(
        students = SAMPLE_STUDENTS.len(),
        exams = SAMPLE_EXAMS.len(),
        "sample data inserted"
    );
    Ok(true)
}

/// One sample per student: a top mark with honors, a pass, and a fail.
const SAMPLE_NUMERIC: [(i32, bool); 3] = [(30, true), (24, false), (15, false)];

fn sample_value(use_letter_grades: bool, index: usize) -> GradeValue {
    if use_letter_grades {
        return GradeValue::Letter(LetterGrade::ALL[index % LetterGrade::ALL.len()]);
    }
    let (value, honors) = SAMPLE_NUMERIC[index % SAMPLE_NUMERIC.len()];
    GradeValue::Numeric { value, honors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GradeFilter, LocalStore};

    #[tokio::test]
    async fn sample_data_is_loaded_once() {
        let store = LocalStore::in_memory();
        assert!(load_sample_data(&store).await.unwrap());
        assert!(!load_sample_data(&store).await.unwrap());

        assert_eq!(store.list_students().await.unwrap().len(), 3);
        assert_eq!(store.list_exams().await.unwrap().len(), 3);
        assert_eq!(store.list_grades(GradeFilter::all()).await.unwrap().len(), 9);
    }

    #[test]
    fn numeric_samples_cover_honors_and_failure() {
        assert_eq!(
            sample_value(false, 0),
            GradeValue::Numeric {
                value: 30,
                honors: true
            }
        );
        assert_eq!(sample_value(false, 2), GradeValue::numeric(15));
        assert_eq!(sample_value(true, 1), GradeValue::Letter(LetterGrade::B));
    }

    #[tokio::test]
    async fn seeded_honors_grade_is_stored() {
        let store = LocalStore::in_memory();
        load_sample_data(&store).await.unwrap();

        let grades = store.list_grades(GradeFilter::all()).await.unwrap();
        let with_honors: Vec<_> = grades
            .iter()
            .filter(|grade| crate::grades::format_grade(grade) == "30L")
            .collect();
        assert_eq!(with_honors.len(), 1);
        assert_eq!(with_honors[0].matricola, "0612710901");
    }
}
