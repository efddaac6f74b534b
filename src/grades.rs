//! Scoring semantics shared by every aggregate.
//!
//! Letter grades are placed on the 0-30 axis at the midpoint of their band:
//!
//! | Letter | Numeric | Band   |
//! |--------|---------|--------|
//! | A      | 30      | 30     |
//! | B      | 28      | 28-29  |
//! | C      | 26      | 25-27  |
//! | D      | 23      | 22-24  |
//! | E      | 19      | 18-21  |
//! | F      | 0       | < 18   |

use crate::models::{Grade, GradeValue, LetterGrade};

pub const MIN_NUMERIC_GRADE: i32 = 0;
pub const MAX_NUMERIC_GRADE: i32 = 30;
pub const PASSING_THRESHOLD: i32 = 18;

pub fn letter_to_numeric(letter: LetterGrade) -> i32 {
    match letter {
        LetterGrade::A => 30,
        LetterGrade::B => 28,
        LetterGrade::C => 26,
        LetterGrade::D => 23,
        LetterGrade::E => 19,
        LetterGrade::F => 0,
    }
}

pub fn numeric_to_letter(numeric: i32) -> LetterGrade {
    match numeric {
        30 => LetterGrade::A,
        28..=29 => LetterGrade::B,
        25..=27 => LetterGrade::C,
        22..=24 => LetterGrade::D,
        18..=21 => LetterGrade::E,
        _ => LetterGrade::F,
    }
}

pub fn is_passing(grade: &Grade) -> bool {
    match grade.value {
        Some(GradeValue::Letter(letter)) => letter != LetterGrade::F,
        Some(GradeValue::Numeric { value, .. }) => value >= PASSING_THRESHOLD,
        None => false,
    }
}

/// Renders a grade the way tables show it: `B`, `27`, `30L`. Empty when unscored.
pub fn format_grade(grade: &Grade) -> String {
    match grade.value {
        Some(GradeValue::Letter(letter)) => letter.to_string(),
        Some(GradeValue::Numeric { value, honors }) => {
            if honors && value == MAX_NUMERIC_GRADE {
                format!("{value}L")
            } else {
                value.to_string()
            }
        }
        None => String::new(),
    }
}

/// Position of a grade on the 0-30 ranking axis.
pub fn numeric_value(grade: &Grade) -> f64 {
    match grade.value {
        Some(GradeValue::Letter(letter)) => letter_to_numeric(letter) as f64,
        Some(GradeValue::Numeric { value, .. }) => value as f64,
        None => 0.0,
    }
}

/// Histogram bucket for a grade, `None` for an unscored record.
pub fn distribution_key(grade: &Grade) -> Option<String> {
    grade.value.map(|_| format_grade(grade))
}

/// Mean of the passing grades only, rounded to two decimals. Zero when nothing passed.
pub fn passing_average<'a, I>(grades: I) -> f64
where
    I: IntoIterator<Item = &'a Grade>,
{
    let (total, count) = grades
        .into_iter()
        .filter(|grade| is_passing(grade))
        .fold((0.0, 0usize), |(total, count), grade| {
            (total + numeric_value(grade), count + 1)
        });

    if count == 0 {
        0.0
    } else {
        round2(total / count as f64)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
