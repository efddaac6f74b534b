use uuid::Uuid;

use crate::grades::{self, round2};
use crate::models::{ExamStats, Grade, GradeStats};

/// Aggregates a grade set into pass counts, a passing-only average and a
/// histogram of raw grade values.
///
/// Failing grades are excluded from the average but still count towards the
/// pass-rate denominator and the distribution. Unscored records count as
/// failing and are left out of the histogram.
pub fn calculate_stats(grades: &[Grade]) -> GradeStats {
    if grades.is_empty() {
        return GradeStats::default();
    }

    let mut stats = GradeStats::default();
    let mut passing_total = 0.0;

    for grade in grades {
        if grades::is_passing(grade) {
            stats.passing += 1;
            passing_total += grades::numeric_value(grade);
        } else {
            stats.failing += 1;
        }

        if let Some(key) = grades::distribution_key(grade) {
            *stats.distribution.entry(key).or_insert(0) += 1;
        }
    }

    if stats.passing > 0 {
        stats.average = round2(passing_total / stats.passing as f64);
    }
    stats.passing_percentage = round2(stats.passing as f64 / grades.len() as f64 * 100.0);
    stats
}

pub fn exam_stats(grades: &[Grade], exam_id: Uuid) -> ExamStats {
    let exam_grades: Vec<Grade> = grades
        .iter()
        .filter(|grade| grade.exam_id == exam_id)
        .cloned()
        .collect();

    ExamStats {
        stats: calculate_stats(&exam_grades),
        grade_count: exam_grades.len(),
    }
}
