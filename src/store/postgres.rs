use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::validate;
use super::{GradeFilter, GradeStore};
use crate::error::{Result, StoreError};
use crate::models::{Exam, ExamKind, Grade, GradeValue, NewExam, NewGrade, NewStudent, Student};

const STUDENT_COLUMNS: &str = "id, matricola, first_name, last_name";
const EXAM_COLUMNS: &str = "id, name, kind, exam_date, use_letter_grades";
const GRADE_COLUMNS: &str = "id, matricola, exam_id, letter_grade, numeric_grade, honors";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, "connected to Postgres");
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn find_exam(&self, id: Uuid) -> Result<Option<Exam>> {
        let row = sqlx::query(&format!(
            "SELECT {EXAM_COLUMNS} FROM grade_dashboard.exams WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(exam_from_row).transpose()
    }

    async fn students_with_matricola(&self, matricola: &str) -> Result<Vec<Student>> {
        let rows = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM grade_dashboard.students WHERE matricola = $1"
        ))
        .bind(matricola)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(student_from_row).collect()
    }
}

fn student_from_row(row: &PgRow) -> Result<Student> {
    Ok(Student {
        id: row.try_get("id")?,
        matricola: row.try_get("matricola")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
    })
}

fn exam_from_row(row: &PgRow) -> Result<Exam> {
    let kind: String = row.try_get("kind")?;
    Ok(Exam {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: kind.parse::<ExamKind>().map_err(StoreError::Validation)?,
        date: row.try_get("exam_date")?,
        use_letter_grades: row.try_get("use_letter_grades")?,
    })
}

/// Rows with neither score column set (or an unknown letter) come back unscored.
fn grade_from_row(row: &PgRow) -> Result<Grade> {
    let letter: Option<String> = row.try_get("letter_grade")?;
    let numeric: Option<i32> = row.try_get("numeric_grade")?;
    let honors: bool = row.try_get("honors")?;

    let value = match (letter, numeric) {
        (Some(letter), _) => letter.parse().ok().map(GradeValue::Letter),
        (None, Some(value)) => Some(GradeValue::Numeric { value, honors }),
        (None, None) => None,
    };

    Ok(Grade {
        id: row.try_get("id")?,
        matricola: row.try_get("matricola")?,
        exam_id: row.try_get("exam_id")?,
        value,
    })
}

fn grade_columns(value: &GradeValue) -> (Option<&'static str>, Option<i32>, bool) {
    match value {
        GradeValue::Letter(letter) => (Some(letter.as_str()), None, false),
        GradeValue::Numeric { value, honors } => (None, Some(*value), *honors),
    }
}

#[async_trait]
impl GradeStore for PgStore {
    async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM grade_dashboard.students ORDER BY last_name, first_name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(student_from_row).collect()
    }

    async fn list_exams(&self) -> Result<Vec<Exam>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXAM_COLUMNS} FROM grade_dashboard.exams ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(exam_from_row).collect()
    }

    async fn list_grades(&self, filter: GradeFilter) -> Result<Vec<Grade>> {
        let rows = sqlx::query(&format!(
            "SELECT {GRADE_COLUMNS} FROM grade_dashboard.grades \
             WHERE ($1::text IS NULL OR matricola = $1) \
             AND ($2::uuid IS NULL OR exam_id = $2) \
             ORDER BY created_at, id"
        ))
        .bind(filter.matricola.as_deref())
        .bind(filter.exam_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(grade_from_row).collect()
    }

    async fn add_student(&self, student: NewStudent) -> Result<Student> {
        validate::validate_student_fields(
            &student.matricola,
            &student.first_name,
            &student.last_name,
        )?;
        let existing = self.students_with_matricola(&student.matricola).await?;
        validate::ensure_unique_matricola(&existing, &student.matricola, None)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO grade_dashboard.students (id, matricola, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&student.matricola)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .fetch_one(&self.pool)
        .await?;

        info!(matricola = %student.matricola, "student added");
        student_from_row(&row)
    }

    async fn update_student(&self, student: Student) -> Result<Student> {
        validate::validate_student_fields(
            &student.matricola,
            &student.first_name,
            &student.last_name,
        )?;
        let existing = self.students_with_matricola(&student.matricola).await?;
        validate::ensure_unique_matricola(&existing, &student.matricola, Some(student.id))?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE grade_dashboard.students
            SET matricola = $2, first_name = $3, last_name = $4
            WHERE id = $1
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(student.id)
        .bind(&student.matricola)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("student {}", student.id)))?;

        student_from_row(&row)
    }

    async fn delete_student(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let matricola: String = sqlx::query(
            "DELETE FROM grade_dashboard.students WHERE id = $1 RETURNING matricola",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("student {id}")))?
        .try_get("matricola")?;

        let removed = sqlx::query("DELETE FROM grade_dashboard.grades WHERE matricola = $1")
            .bind(&matricola)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        info!(matricola = %matricola, grades_removed = removed, "student deleted");
        Ok(())
    }

    async fn add_exam(&self, exam: NewExam) -> Result<Exam> {
        if exam.name.trim().is_empty() {
            return Err(StoreError::validation("exam name is required"));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO grade_dashboard.exams (id, name, kind, exam_date, use_letter_grades)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&exam.name)
        .bind(exam.kind.as_str())
        .bind(exam.date)
        .bind(exam.use_letter_grades)
        .fetch_one(&self.pool)
        .await?;

        let created = exam_from_row(&row)?;
        info!(exam_id = %created.id, name = %created.name, "exam added");
        Ok(created)
    }

    async fn update_exam(&self, exam: Exam) -> Result<Exam> {
        let mut tx = self.pool.begin().await?;

        // Row lock holds off concurrent grade inserts, which need a key-share lock on the exam.
        let current = sqlx::query(&format!(
            "SELECT {EXAM_COLUMNS} FROM grade_dashboard.exams WHERE id = $1 FOR UPDATE"
        ))
        .bind(exam.id)
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(exam_from_row)
        .transpose()?
        .ok_or_else(|| StoreError::not_found(format!("exam {}", exam.id)))?;
        let grades = sqlx::query(&format!(
            "SELECT {GRADE_COLUMNS} FROM grade_dashboard.grades WHERE exam_id = $1"
        ))
        .bind(exam.id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(grade_from_row)
        .collect::<Result<Vec<_>>>()?;
        validate::validate_exam_update(&current, &exam, &grades)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE grade_dashboard.exams
            SET name = $2, kind = $3, exam_date = $4, use_letter_grades = $5
            WHERE id = $1
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(exam.id)
        .bind(&exam.name)
        .bind(exam.kind.as_str())
        .bind(exam.date)
        .bind(exam.use_letter_grades)
        .fetch_one(&mut *tx)
        .await?;
        let updated = exam_from_row(&row)?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_exam(&self, id: Uuid) -> Result<()> {
        // grades go with the exam through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM grade_dashboard.exams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("exam {id}")));
        }

        info!(exam_id = %id, "exam deleted");
        Ok(())
    }

    async fn add_grade(&self, grade: NewGrade) -> Result<Grade> {
        if grade.matricola.trim().is_empty() {
            return Err(StoreError::validation("matricola is required"));
        }
        let exam = self.find_exam(grade.exam_id).await?;
        validate::validate_grade(exam.as_ref(), &grade.value)?;

        let (letter, numeric, honors) = grade_columns(&grade.value);
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO grade_dashboard.grades
            (id, matricola, exam_id, letter_grade, numeric_grade, honors)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {GRADE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&grade.matricola)
        .bind(grade.exam_id)
        .bind(letter)
        .bind(numeric)
        .bind(honors)
        .fetch_one(&self.pool)
        .await?;

        debug!(matricola = %grade.matricola, exam_id = %grade.exam_id, "grade added");
        grade_from_row(&row)
    }

    async fn update_grade(&self, grade: Grade) -> Result<Grade> {
        let value = grade
            .value
            .ok_or_else(|| StoreError::validation("a grade needs a letter or numeric value"))?;
        let exam = self.find_exam(grade.exam_id).await?;
        validate::validate_grade(exam.as_ref(), &value)?;

        let (letter, numeric, honors) = grade_columns(&value);
        let row = sqlx::query(&format!(
            r#"
            UPDATE grade_dashboard.grades
            SET matricola = $2, exam_id = $3, letter_grade = $4, numeric_grade = $5, honors = $6
            WHERE id = $1
            RETURNING {GRADE_COLUMNS}
            "#
        ))
        .bind(grade.id)
        .bind(&grade.matricola)
        .bind(grade.exam_id)
        .bind(letter)
        .bind(numeric)
        .bind(honors)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("grade {}", grade.id)))?;

        grade_from_row(&row)
    }

    async fn delete_grade(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM grade_dashboard.grades WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("grade {id}")));
        }
        Ok(())
    }
}
