//! Write-time checks shared by every backend.

use crate::error::{Result, StoreError};
use crate::grades::{MAX_NUMERIC_GRADE, MIN_NUMERIC_GRADE};
use crate::models::{Exam, Grade, GradeValue, Student};

/// Checks a grade value against the exam it references.
pub fn validate_grade(exam: Option<&Exam>, value: &GradeValue) -> Result<()> {
    let exam = exam.ok_or_else(|| StoreError::not_found("related exam"))?;

    match value {
        GradeValue::Letter(_) if !exam.use_letter_grades => Err(StoreError::validation(format!(
            "exam '{}' uses numeric grades, a letter grade is not applicable",
            exam.name
        ))),
        GradeValue::Numeric { .. } if exam.use_letter_grades => {
            Err(StoreError::validation(format!(
                "exam '{}' uses letter grades, a numeric grade is not applicable",
                exam.name
            )))
        }
        GradeValue::Numeric { value, .. }
            if !(MIN_NUMERIC_GRADE..=MAX_NUMERIC_GRADE).contains(value) =>
        {
            Err(StoreError::validation(format!(
                "numeric grade must be between {MIN_NUMERIC_GRADE} and {MAX_NUMERIC_GRADE}, got {value}"
            )))
        }
        GradeValue::Numeric {
            value,
            honors: true,
        } if *value != MAX_NUMERIC_GRADE => Err(StoreError::validation(format!(
            "honors can only be awarded with {MAX_NUMERIC_GRADE}, got {value}"
        ))),
        _ => Ok(()),
    }
}

pub fn validate_student_fields(matricola: &str, first_name: &str, last_name: &str) -> Result<()> {
    for (field, value) in [
        ("matricola", matricola),
        ("first name", first_name),
        ("last name", last_name),
    ] {
        if value.trim().is_empty() {
            return Err(StoreError::validation(format!("{field} is required")));
        }
    }
    Ok(())
}

/// Rejects a matricola already held by another student. `own_id` is skipped on update.
pub fn ensure_unique_matricola(
    students: &[Student],
    matricola: &str,
    own_id: Option<uuid::Uuid>,
) -> Result<()> {
    let taken = students
        .iter()
        .any(|student| student.matricola == matricola && Some(student.id) != own_id);
    if taken {
        return Err(StoreError::validation(format!(
            "matricola {matricola} already exists"
        )));
    }
    Ok(())
}

/// An exam's notation is frozen once grades reference it.
pub fn validate_exam_update(current: &Exam, updated: &Exam, grades: &[Grade]) -> Result<()> {
    if updated.name.trim().is_empty() {
        return Err(StoreError::validation("exam name is required"));
    }
    let has_grades = grades.iter().any(|grade| grade.exam_id == current.id);
    if has_grades && current.use_letter_grades != updated.use_letter_grades {
        return Err(StoreError::validation(format!(
            "exam '{}' already has grades, its grading notation cannot change",
            current.name
        )));
    }
    Ok(())
}
