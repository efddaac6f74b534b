use std::fmt::Write;

use uuid::Uuid;

use crate::analytics::{self, Snapshot};
use crate::grades;
use crate::models::{GradeStats, LetterGrade};

const TOP_STUDENTS: usize = 10;

fn write_distribution(output: &mut String, stats: &GradeStats) {
    if stats.distribution.is_empty() {
        let _ = writeln!(output, "No grades recorded.");
        return;
    }

    let mut buckets: Vec<(&String, &usize)> = stats.distribution.iter().collect();
    buckets.sort_by(|a, b| bucket_order(b.0).cmp(&bucket_order(a.0)));
    for (grade, count) in buckets {
        let _ = writeln!(output, "- {grade}: {count}");
    }
}

/// Orders histogram buckets best first: `30L`, `30`, ... `0`, then `A` ... `F`.
fn bucket_order(key: &str) -> (i32, i32) {
    if let Ok(letter) = key.parse::<LetterGrade>() {
        return (-1, grades::letter_to_numeric(letter));
    }
    let honors = key.ends_with('L');
    let value = key.trim_end_matches('L').parse::<i32>().unwrap_or(0);
    (value, i32::from(honors))
}

pub fn build_report(snapshot: &Snapshot, exam_id: Option<Uuid>) -> String {
    let dashboard = analytics::dashboard_analytics(snapshot, exam_id);
    let students = snapshot.student_ranking(exam_id);
    let exams = snapshot.exam_ranking();

    let mut output = String::new();
    let scope_label = exam_id
        .and_then(|id| snapshot.exam(id))
        .map(|exam| format!("{} ({})", exam.name, exam.date))
        .unwrap_or_else(|| "all exams".to_string());

    let _ = writeln!(output, "# Grade Dashboard Report");
    let _ = writeln!(output, "Generated for {scope_label}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- Registered students: {}",
        dashboard.counts.registered_students
    );
    let _ = writeln!(
        output,
        "- Students with grades: {}",
        dashboard.counts.students_with_grades
    );
    let _ = writeln!(output, "- Exams: {}", dashboard.counts.exams);
    let _ = writeln!(output, "- Grades: {}", dashboard.counts.grades);
    let _ = writeln!(
        output,
        "- Average (passing grades): {:.2}",
        dashboard.stats.average
    );
    let _ = writeln!(
        output,
        "- Passed: {} / Failed: {} ({:.2}% pass rate)",
        dashboard.stats.passing, dashboard.stats.failing, dashboard.stats.passing_percentage
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");
    write_distribution(&mut output, &dashboard.stats);

    if exam_id.is_none() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Exam Ranking");

        if exams.is_empty() {
            let _ = writeln!(output, "No exams recorded.");
        } else {
            for (position, row) in exams.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "{}. {} ({}) average {:.2}, {:.2}% passed, {} students",
                    position + 1,
                    row.exam.name,
                    row.exam.date,
                    row.stats.average,
                    row.stats.passing_percentage,
                    row.student_count
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Student Ranking");

    if students.is_empty() {
        let _ = writeln!(output, "No students with passing grades in this scope.");
    } else {
        for (position, row) in students.iter().take(TOP_STUDENTS).enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({}) {:.2} over {} grades",
                position + 1,
                row.display_name(),
                row.matricola,
                row.average,
                row.grades.len()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Exams");

    if dashboard.recent_exams.is_empty() {
        let _ = writeln!(output, "No exams recorded.");
    } else {
        for recent in dashboard.recent_exams.iter() {
            let _ = writeln!(
                output,
                "- {} on {} ({}): {} grades, average {:.2}",
                recent.exam.name,
                recent.exam.date,
                recent.exam.kind.as_str(),
                recent.stats.grade_count,
                recent.stats.stats.average
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Exam, ExamKind, Grade, GradeValue, Student};
    use chrono::NaiveDate;

    fn snapshot() -> (Snapshot, Exam) {
        let exam = Exam {
            id: Uuid::new_v4(),
            name: "Fisica - Computo finale".to_string(),
            kind: ExamKind::Full,
            date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            use_letter_grades: false,
        };
        let grade = |matricola: &str, value: GradeValue| Grade {
            id: Uuid::new_v4(),
            matricola: matricola.to_string(),
            exam_id: exam.id,
            value: Some(value),
        };
        let snapshot = Snapshot {
            students: vec![Student {
                id: Uuid::new_v4(),
                matricola: "0612710901".to_string(),
                first_name: "Marco".to_string(),
                last_name: "Rossi".to_string(),
            }],
            grades: vec![
                grade(
                    "0612710901",
                    GradeValue::Numeric {
                        value: 30,
                        honors: true,
                    },
                ),
                grade("0612710999", GradeValue::numeric(21)),
                grade("0612710998", GradeValue::numeric(12)),
            ],
            exams: vec![exam.clone()],
        };
        (snapshot, exam)
    }

    #[test]
    fn report_lists_rankings_and_placeholders() {
        let (snapshot, _) = snapshot();
        let report = build_report(&snapshot, None);

        assert!(report.contains("Generated for all exams"));
        assert!(report.contains("- Grades: 3"));
        assert!(report.contains("1. Marco Rossi (0612710901) 30.00 over 1 grades"));
        assert!(report.contains("2. Non registrato (0612710999) 21.00 over 1 grades"));
        assert!(!report.contains("0612710998"));
        assert!(report.contains("## Exam Ranking"));
    }

    #[test]
    fn exam_scoped_report_skips_exam_ranking() {
        let (snapshot, exam) = snapshot();
        let report = build_report(&snapshot, Some(exam.id));

        assert!(report.contains("Generated for Fisica - Computo finale (2025-06-30)"));
        assert!(!report.contains("## Exam Ranking"));
        assert!(report.contains("- 30L: 1"));
    }

    #[test]
    fn distribution_lists_best_buckets_first() {
        let (snapshot, _) = snapshot();
        let report = build_report(&snapshot, None);
        let honors = report.find("- 30L: 1").unwrap();
        let pass = report.find("- 21: 1").unwrap();
        let fail = report.find("- 12: 1").unwrap();
        assert!(honors < pass && pass < fail);
    }

    #[test]
    fn empty_snapshot_renders_placeholders() {
        let report = build_report(&Snapshot::default(), None);
        assert!(report.contains("No grades recorded."));
        assert!(report.contains("No students with passing grades in this scope."));
    }
}
