use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label shown for a matricola that has grades but no registered student.
pub const UNREGISTERED_LABEL: &str = "Non registrato";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub matricola: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub matricola: String,
    pub first_name: String,
    pub last_name: String,
}

/// Administrative classification of an exam. Not used in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamKind {
    #[serde(rename = "intermedio")]
    Intermediate,
    #[serde(rename = "completo")]
    Full,
}

impl ExamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamKind::Intermediate => "intermedio",
            ExamKind::Full => "completo",
        }
    }
}

impl FromStr for ExamKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "intermedio" | "intermediate" => Ok(ExamKind::Intermediate),
            "completo" | "full" => Ok(ExamKind::Full),
            other => Err(format!("unknown exam kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub name: String,
    pub kind: ExamKind,
    pub date: NaiveDate,
    /// Selects the notation every grade on this exam must use.
    pub use_letter_grades: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExam {
    pub name: String,
    pub kind: ExamKind,
    pub date: NaiveDate,
    pub use_letter_grades: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl LetterGrade {
    pub const ALL: [LetterGrade; 6] = [
        LetterGrade::A,
        LetterGrade::B,
        LetterGrade::C,
        LetterGrade::D,
        LetterGrade::E,
        LetterGrade::F,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::E => "E",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let upper = value.trim().to_ascii_uppercase();
        LetterGrade::ALL
            .into_iter()
            .find(|letter| letter.as_str() == upper)
            .ok_or_else(|| format!("invalid letter grade '{}'", value.trim()))
    }
}

/// The score carried by a grade: one notation or the other, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeValue {
    Letter(LetterGrade),
    Numeric {
        value: i32,
        #[serde(default)]
        honors: bool,
    },
}

impl GradeValue {
    pub fn numeric(value: i32) -> Self {
        GradeValue::Numeric {
            value,
            honors: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: Uuid,
    /// May reference a matricola with no registered student.
    pub matricola: String,
    pub exam_id: Uuid,
    /// `None` only for malformed records read back from storage.
    pub value: Option<GradeValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrade {
    pub matricola: String,
    pub exam_id: Uuid,
    pub value: GradeValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradeStats {
    pub average: f64,
    pub passing: usize,
    pub failing: usize,
    pub passing_percentage: f64,
    pub distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamStats {
    #[serde(flatten)]
    pub stats: GradeStats,
    pub grade_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeWithExam {
    pub grade: Grade,
    pub exam: Exam,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentWithGrades {
    pub matricola: String,
    /// `None` when the matricola only appears in grade records.
    pub student: Option<Student>,
    pub grades: Vec<GradeWithExam>,
    pub average: f64,
}

impl StudentWithGrades {
    pub fn display_name(&self) -> String {
        match &self.student {
            Some(student) => format!("{} {}", student.first_name, student.last_name),
            None => UNREGISTERED_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamWithStats {
    pub exam: Exam,
    pub stats: GradeStats,
    pub student_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentExam {
    pub exam: Exam,
    pub stats: ExamStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub registered_students: usize,
    pub students_with_grades: usize,
    pub exams: usize,
    pub grades: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardAnalytics {
    pub exam_id: Option<Uuid>,
    pub counts: DashboardCounts,
    pub stats: GradeStats,
    pub recent_exams: Vec<RecentExam>,
}
