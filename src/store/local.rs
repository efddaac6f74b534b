use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::validate;
use super::{GradeFilter, GradeStore};
use crate::error::{Result, StoreError};
use crate::models::{Exam, Grade, NewExam, NewGrade, NewStudent, Student};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    students: Vec<Student>,
    exams: Vec<Exam>,
    grades: Vec<Grade>,
}

/// In-process store, optionally mirrored to a JSON file after every write.
pub struct LocalStore {
    tables: RwLock<Tables>,
    path: Option<PathBuf>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            path: None,
        }
    }

    /// Loads `path` if it exists, otherwise starts empty and creates it on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            Tables::default()
        };
        info!(path = %path.display(), "opened local data file");

        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path),
        })
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, serde_json::to_vec_pretty(tables)?).await?;
            debug!(path = %path.display(), "data file written");
        }
        Ok(())
    }

    /// Applies `change` to a copy of the tables and swaps it in only once the
    /// data file holds it. A failed write leaves the store untouched.
    async fn write<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T>,
    {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        let outcome = change(&mut next)?;
        self.persist(&next).await?;
        *tables = next;
        Ok(outcome)
    }
}

#[async_trait]
impl GradeStore for LocalStore {
    async fn list_students(&self) -> Result<Vec<Student>> {
        Ok(self.tables.read().await.students.clone())
    }

    async fn list_exams(&self) -> Result<Vec<Exam>> {
        Ok(self.tables.read().await.exams.clone())
    }

    async fn list_grades(&self, filter: GradeFilter) -> Result<Vec<Grade>> {
        let tables = self.tables.read().await;
        Ok(tables
            .grades
            .iter()
            .filter(|grade| filter.matches(grade))
            .cloned()
            .collect())
    }

    async fn add_student(&self, student: NewStudent) -> Result<Student> {
        validate::validate_student_fields(
            &student.matricola,
            &student.first_name,
            &student.last_name,
        )?;

        let created = self
            .write(|tables| {
                validate::ensure_unique_matricola(&tables.students, &student.matricola, None)?;
                let created = Student {
                    id: Uuid::new_v4(),
                    matricola: student.matricola,
                    first_name: student.first_name,
                    last_name: student.last_name,
                };
                tables.students.push(created.clone());
                Ok(created)
            })
            .await?;
        info!(matricola = %created.matricola, "student added");
        Ok(created)
    }

    async fn update_student(&self, student: Student) -> Result<Student> {
        validate::validate_student_fields(
            &student.matricola,
            &student.first_name,
            &student.last_name,
        )?;

        self.write(|tables| {
            let index = tables
                .students
                .iter()
                .position(|s| s.id == student.id)
                .ok_or_else(|| StoreError::not_found(format!("student {}", student.id)))?;
            validate::ensure_unique_matricola(
                &tables.students,
                &student.matricola,
                Some(student.id),
            )?;
            tables.students[index] = student.clone();
            Ok(student)
        })
        .await
    }

    async fn delete_student(&self, id: Uuid) -> Result<()> {
        let (matricola, grades_removed) = self
            .write(|tables| {
                let index = tables
                    .students
                    .iter()
                    .position(|s| s.id == id)
                    .ok_or_else(|| StoreError::not_found(format!("student {id}")))?;
                let removed = tables.students.remove(index);
                let before = tables.grades.len();
                tables.grades.retain(|grade| grade.matricola != removed.matricola);
                Ok((removed.matricola, before - tables.grades.len()))
            })
            .await?;
        info!(matricola = %matricola, grades_removed, "student deleted");
        Ok(())
    }

    async fn add_exam(&self, exam: NewExam) -> Result<Exam> {
        if exam.name.trim().is_empty() {
            return Err(StoreError::validation("exam name is required"));
        }

        let created = Exam {
            id: Uuid::new_v4(),
            name: exam.name,
            kind: exam.kind,
            date: exam.date,
            use_letter_grades: exam.use_letter_grades,
        };
        self.write(|tables| {
            tables.exams.push(created.clone());
            Ok(())
        })
        .await?;
        info!(exam_id = %created.id, name = %created.name, "exam added");
        Ok(created)
    }

    async fn update_exam(&self, exam: Exam) -> Result<Exam> {
        self.write(|tables| {
            let index = tables
                .exams
                .iter()
                .position(|e| e.id == exam.id)
                .ok_or_else(|| StoreError::not_found(format!("exam {}", exam.id)))?;
            validate::validate_exam_update(&tables.exams[index], &exam, &tables.grades)?;
            tables.exams[index] = exam.clone();
            Ok(exam)
        })
        .await
    }

    async fn delete_exam(&self, id: Uuid) -> Result<()> {
        let grades_removed = self
            .write(|tables| {
                let index = tables
                    .exams
                    .iter()
                    .position(|e| e.id == id)
                    .ok_or_else(|| StoreError::not_found(format!("exam {id}")))?;
                tables.exams.remove(index);
                let before = tables.grades.len();
                tables.grades.retain(|grade| grade.exam_id != id);
                Ok(before - tables.grades.len())
            })
            .await?;
        info!(exam_id = %id, grades_removed, "exam deleted");
        Ok(())
    }

    async fn add_grade(&self, grade: NewGrade) -> Result<Grade> {
        if grade.matricola.trim().is_empty() {
            return Err(StoreError::validation("matricola is required"));
        }

        let created = self
            .write(|tables| {
                let exam = tables.exams.iter().find(|e| e.id == grade.exam_id);
                validate::validate_grade(exam, &grade.value)?;
                let created = Grade {
                    id: Uuid::new_v4(),
                    matricola: grade.matricola,
                    exam_id: grade.exam_id,
                    value: Some(grade.value),
                };
                tables.grades.push(created.clone());
                Ok(created)
            })
            .await?;
        debug!(matricola = %created.matricola, exam_id = %created.exam_id, "grade added");
        Ok(created)
    }

    async fn update_grade(&self, grade: Grade) -> Result<Grade> {
        let value = grade
            .value
            .ok_or_else(|| StoreError::validation("a grade needs a letter or numeric value"))?;

        self.write(|tables| {
            let index = tables
                .grades
                .iter()
                .position(|g| g.id == grade.id)
                .ok_or_else(|| StoreError::not_found(format!("grade {}", grade.id)))?;
            let exam = tables.exams.iter().find(|e| e.id == grade.exam_id);
            validate::validate_grade(exam, &value)?;
            tables.grades[index] = grade.clone();
            Ok(grade)
        })
        .await
    }

    async fn delete_grade(&self, id: Uuid) -> Result<()> {
        self.write(|tables| {
            let index = tables
                .grades
                .iter()
                .position(|g| g.id == id)
                .ok_or_else(|| StoreError::not_found(format!("grade {id}")))?;
            tables.grades.remove(index);
            Ok(())
        })
        .await
    }
}
