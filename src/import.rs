//! CSV import of students and grades.
//!
//! A bad row never aborts an import: it is logged, counted, and the next row
//! is processed. Only storage failures unrelated to the row propagate.

use std::collections::HashSet;
use std::io::Read;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::grades::{MAX_NUMERIC_GRADE, MIN_NUMERIC_GRADE};
use crate::models::{Exam, GradeValue, LetterGrade, NewGrade, NewStudent};
use crate::store::GradeStore;

const STUDENT_HEADER_WORDS: [&str; 3] = ["matricola", "nome", "cognome"];

#[derive(Debug, Error)]
pub enum ImportRowError {
    #[error("expected at least {expected} columns, found {found}")]
    MissingColumns { expected: usize, found: usize },

    #[error("{0} is empty")]
    EmptyField(&'static str),

    #[error("invalid letter grade '{0}'")]
    InvalidLetter(String),

    #[error("invalid numeric grade '{0}'")]
    InvalidNumeric(String),

    #[error("honors can only be awarded with 30, got {0}")]
    HonorsWithoutThirty(i32),

    #[error("unreadable row: {0}")]
    Malformed(#[from] csv::Error),

    #[error("{0}")]
    Rejected(StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Students whose matricola was already registered.
    pub skipped: usize,
    pub errors: usize,
}

impl ImportReport {
    fn fail(&mut self, row: usize, error: &ImportRowError) {
        self.errors += 1;
        warn!(row, error = %error, "import row rejected");
    }
}

fn csv_reader<R: Read>(input: R, has_header: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

/// Write failures caused by the row's content become row errors; anything
/// else (connection, disk) aborts the import.
fn row_rejection(error: StoreError) -> Result<ImportRowError> {
    match error {
        StoreError::Validation(_) | StoreError::NotFound(_) => Ok(ImportRowError::Rejected(error)),
        other => Err(other),
    }
}

/// Imports `matricola,nome,cognome` rows. A header row is detected when the
/// first row names any of those columns.
pub async fn import_students<R: Read>(store: &dyn GradeStore, input: R) -> Result<ImportReport> {
    let mut registered: HashSet<String> = store
        .list_students()
        .await?
        .into_iter()
        .map(|student| student.matricola)
        .collect();
    let mut report = ImportReport::default();

    for (index, record) in csv_reader(input, false).records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                report.fail(row, &ImportRowError::from(err));
                continue;
            }
        };

        if row == 1 && looks_like_student_header(&record) {
            continue;
        }
        if record.len() < 3 {
            let error = ImportRowError::MissingColumns {
                expected: 3,
                found: record.len(),
            };
            report.fail(row, &error);
            continue;
        }

        let student = NewStudent {
            matricola: record[0].to_string(),
            first_name: record[1].to_string(),
            last_name: record[2].to_string(),
        };
        if let Some(field) = first_empty_field(&student) {
            report.fail(row, &ImportRowError::EmptyField(field));
            continue;
        }
        if registered.contains(&student.matricola) {
            report.skipped += 1;
            continue;
        }

        let matricola = student.matricola.clone();
        match store.add_student(student).await {
            Ok(_) => {
                registered.insert(matricola);
                report.imported += 1;
            }
            Err(err) => report.fail(row, &row_rejection(err)?),
        }
    }

    info!(
        imported = report.imported,
        skipped = report.skipped,
        errors = report.errors,
        "student import finished"
    );
    Ok(report)
}

/// Imports `matricola,voto[,lode]` rows into one exam. The exam's notation
/// decides how the grade column is read.
pub async fn import_grades<R: Read>(
    store: &dyn GradeStore,
    exam_id: Uuid,
    input: R,
    has_header: bool,
) -> Result<ImportReport> {
    let exam = store
        .list_exams()
        .await?
        .into_iter()
        .find(|exam| exam.id == exam_id)
        .ok_or_else(|| StoreError::not_found(format!("exam {exam_id}")))?;
    let first_row = if has_header { 2 } else { 1 };
    let mut report = ImportReport::default();

    for (index, record) in csv_reader(input, has_header).records().enumerate() {
        let row = index + first_row;
        let parsed = record
            .map_err(ImportRowError::from)
            .and_then(|record| parse_grade_row(&exam, &record));
        let grade = match parsed {
            Ok(grade) => grade,
            Err(error) => {
                report.fail(row, &error);
                continue;
            }
        };

        match store.add_grade(grade).await {
            Ok(_) => report.imported += 1,
            Err(err) => report.fail(row, &row_rejection(err)?),
        }
    }

    info!(
        exam_id = %exam.id,
        imported = report.imported,
        errors = report.errors,
        "grade import finished"
    );
    Ok(report)
}

fn parse_grade_row(
    exam: &Exam,
    record: &csv::StringRecord,
) -> std::result::Result<NewGrade, ImportRowError> {
    if record.len() < 2 {
        return Err(ImportRowError::MissingColumns {
            expected: 2,
            found: record.len(),
        });
    }
    let matricola = &record[0];
    if matricola.is_empty() {
        return Err(ImportRowError::EmptyField("matricola"));
    }

    let value = if exam.use_letter_grades {
        let letter = record[1]
            .parse::<LetterGrade>()
            .map_err(|_| ImportRowError::InvalidLetter(record[1].to_string()))?;
        GradeValue::Letter(letter)
    } else {
        let value = record[1]
            .parse::<i32>()
            .ok()
            .filter(|value| (MIN_NUMERIC_GRADE..=MAX_NUMERIC_GRADE).contains(value))
            .ok_or_else(|| ImportRowError::InvalidNumeric(record[1].to_string()))?;
        let honors = record
            .get(2)
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true") || flag == "1");
        if honors && value != MAX_NUMERIC_GRADE {
            return Err(ImportRowError::HonorsWithoutThirty(value));
        }
        GradeValue::Numeric { value, honors }
    };

    Ok(NewGrade {
        matricola: matricola.to_string(),
        exam_id: exam.id,
        value,
    })
}

fn looks_like_student_header(record: &csv::StringRecord) -> bool {
    record.iter().any(|field| {
        let field = field.to_ascii_lowercase();
        STUDENT_HEADER_WORDS.iter().any(|word| field.contains(word))
    })
}

fn first_empty_field(student: &NewStudent) -> Option<&'static str> {
    [
        ("matricola", &student.matricola),
        ("nome", &student.first_name),
        ("cognome", &student.last_name),
    ]
    .into_iter()
    .find(|(_, value)| value.is_empty())
    .map(|(field, _)| field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExamKind, NewExam};
    use crate::store::{GradeFilter, LocalStore};
    use chrono::NaiveDate;

    async fn store_with_exam(use_letter_grades: bool) -> (LocalStore, Exam) {
        let store = LocalStore::in_memory();
        let exam = store
            .add_exam(NewExam {
                name: "Basi di Dati".to_string(),
                kind: ExamKind::Full,
                date: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
                use_letter_grades,
            })
            .await
            .unwrap();
        (store, exam)
    }

    #[tokio::test]
    async fn students_import_skips_header_and_known_matricole() {
        let store = LocalStore::in_memory();
        store
            .add_student(NewStudent {
                matricola: "0612710901".to_string(),
                first_name: "Marco".to_string(),
                last_name: "Rossi".to_string(),
            })
            .await
            .unwrap();

        let csv = "matricola,nome,cognome\n\
                   0612710901,Marco,Rossi\n\
                   0612710902, Lucia , Bianchi\n\
                   0612710903,Giovanni\n\
                   0612710902,Lucia,Bianchi\n\
                   0612710904,,Neri\n";
        let report = import_students(&store, csv.as_bytes()).await.unwrap();

        assert_eq!(
            report,
            ImportReport {
                imported: 1,
                skipped: 2,
                errors: 2
            }
        );
        let students = store.list_students().await.unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[1].first_name, "Lucia");
    }

    #[tokio::test]
    async fn students_import_without_header_keeps_first_row() {
        let store = LocalStore::in_memory();
        let report = import_students(&store, "0612710905,Anna,Conti\n".as_bytes())
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
    }

    #[tokio::test]
    async fn numeric_grades_import_counts_bad_rows() {
        let (store, exam) = store_with_exam(false).await;
        let csv = "matricola,voto,lode\n\
                   0612710901,30,true\n\
                   0612710902,0\n\
                   0612710903,31\n\
                   0612710904,abc\n\
                   0612710905,29,1\n\
                   0612710906\n\
                   0612710907,18,false\n";

        let report = import_grades(&store, exam.id, csv.as_bytes(), true).await.unwrap();
        assert_eq!(report.imported, 3);
        assert_eq!(report.errors, 4);

        let grades = store.list_grades(GradeFilter::by_exam(exam.id)).await.unwrap();
        assert_eq!(
            grades[0].value,
            Some(GradeValue::Numeric {
                value: 30,
                honors: true
            })
        );
        assert_eq!(grades[1].value, Some(GradeValue::numeric(0)));
    }

    #[tokio::test]
    async fn letter_grades_import_is_case_insensitive() {
        let (store, exam) = store_with_exam(true).await;
        let csv = "0612710901,b\n0612710902,G\n0612710903, f \n";

        let report = import_grades(&store, exam.id, csv.as_bytes(), false).await.unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.errors, 1);

        let grades = store.list_grades(GradeFilter::all()).await.unwrap();
        assert_eq!(grades[0].value, Some(GradeValue::Letter(LetterGrade::B)));
        assert_eq!(grades[1].value, Some(GradeValue::Letter(LetterGrade::F)));
    }

    #[tokio::test]
    async fn unknown_exam_aborts_the_import() {
        let store = LocalStore::in_memory();
        let result = import_grades(&store, Uuid::new_v4(), "M1,20\n".as_bytes(), false).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
