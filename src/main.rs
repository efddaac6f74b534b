use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use grade_dashboard::analytics::{self, Snapshot};
use grade_dashboard::config::{Backend, Settings};
use grade_dashboard::grades;
use grade_dashboard::models::{ExamKind, GradeValue, LetterGrade, NewExam, NewGrade, NewStudent};
use grade_dashboard::store::{GradeStore, LocalStore, PgStore};
use grade_dashboard::{import, report, seed};

#[derive(Parser)]
#[command(name = "grade-dashboard")]
#[command(about = "University grade dashboard: statistics and rankings for exams and students", long_about = None)]
struct Cli {
    /// JSON data file used when DATABASE_URL is not set
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema
    InitDb,
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that read or write grades through an open store.
#[derive(Subcommand)]
enum StoreCommand {
    /// Load sample students, exams and grades into an empty store
    Seed,
    /// Register a student
    AddStudent {
        matricola: String,
        first_name: String,
        last_name: String,
    },
    /// Remove a student and every grade carrying their matricola
    DeleteStudent { matricola: String },
    /// Create an exam
    AddExam {
        name: String,
        /// Exam date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// intermedio or completo
        #[arg(long, default_value = "completo")]
        kind: ExamKind,
        /// Grade this exam with letters A-F instead of 0-30
        #[arg(long)]
        letter_grades: bool,
    },
    /// Remove an exam and its grades
    DeleteExam { id: Uuid },
    /// Record a grade; the exam decides whether it is a letter or a number
    AddGrade {
        #[arg(long)]
        exam: Uuid,
        matricola: String,
        grade: String,
        /// With honors (only on 30)
        #[arg(long)]
        lode: bool,
    },
    /// Import students from a matricola,nome,cognome CSV file
    ImportStudents {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import grades for one exam from a matricola,voto[,lode] CSV file
    ImportGrades {
        #[arg(long)]
        exam: Uuid,
        #[arg(long)]
        csv: PathBuf,
        /// The first row is a header
        #[arg(long)]
        header: bool,
    },
    /// Show dashboard counts and statistics
    Dashboard {
        #[arg(long)]
        exam: Option<Uuid>,
        #[arg(long)]
        json: bool,
    },
    /// Rank students by passing average, or by their grade on one exam
    Ranking {
        #[arg(long)]
        exam: Option<Uuid>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Rank exams by average grade
    ExamRanking {
        #[arg(long)]
        json: bool,
    },
    /// Show one student's grades and average
    Student {
        matricola: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        exam: Option<Uuid>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn open_store(settings: &Settings) -> anyhow::Result<Box<dyn GradeStore>> {
    let store: Box<dyn GradeStore> = match settings.backend() {
        Backend::Postgres {
            url,
            max_connections,
        } => Box::new(
            PgStore::connect(&url, max_connections)
                .await
                .context("failed to connect to Postgres")?,
        ),
        Backend::LocalFile(path) => Box::new(
            LocalStore::open(&path)
                .with_context(|| format!("failed to open data file {}", path.display()))?,
        ),
    };
    Ok(store)
}

fn parse_grade(use_letter_grades: bool, raw: &str, lode: bool) -> anyhow::Result<GradeValue> {
    if use_letter_grades {
        if lode {
            bail!("lode only applies to numeric grades");
        }
        let letter = raw.parse::<LetterGrade>().map_err(anyhow::Error::msg)?;
        return Ok(GradeValue::Letter(letter));
    }
    let value = raw
        .trim()
        .parse::<i32>()
        .with_context(|| format!("'{raw}' is not a numeric grade"))?;
    Ok(GradeValue::Numeric {
        value,
        honors: lode,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn init_db(settings: &Settings) -> anyhow::Result<()> {
    match settings.backend() {
        Backend::Postgres {
            url,
            max_connections,
        } => {
            let store = PgStore::connect(&url, max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store.init_schema().await?;
            println!("Schema ready.");
        }
        Backend::LocalFile(path) => {
            println!(
                "DATABASE_URL is not set; {} needs no schema.",
                path.display()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if let Some(path) = cli.data_file {
        settings.data_file = path;
    }

    match cli.command {
        Commands::InitDb => init_db(&settings).await,
        Commands::Store(command) => {
            let store = open_store(&settings).await?;
            run(command, store.as_ref()).await
        }
    }
}

async fn run(command: StoreCommand, store: &dyn GradeStore) -> anyhow::Result<()> {
    match command {
        StoreCommand::Seed => {
            if seed::load_sample_data(store).await? {
                println!("Sample data inserted.");
            } else {
                println!("Store already has data, nothing inserted.");
            }
        }
        StoreCommand::AddStudent {
            matricola,
            first_name,
            last_name,
        } => {
            let student = store
                .add_student(NewStudent {
                    matricola,
                    first_name,
                    last_name,
                })
                .await?;
            println!("Student {} registered ({}).", student.matricola, student.id);
        }
        StoreCommand::DeleteStudent { matricola } => {
            let student = store
                .list_students()
                .await?
                .into_iter()
                .find(|student| student.matricola == matricola)
                .with_context(|| format!("no student with matricola {matricola}"))?;
            store.delete_student(student.id).await?;
            println!("Student {matricola} and their grades deleted.");
        }
        StoreCommand::AddExam {
            name,
            date,
            kind,
            letter_grades,
        } => {
            let exam = store
                .add_exam(NewExam {
                    name,
                    kind,
                    date,
                    use_letter_grades: letter_grades,
                })
                .await?;
            println!("Exam '{}' created with id {}.", exam.name, exam.id);
        }
        StoreCommand::DeleteExam { id } => {
            store.delete_exam(id).await?;
            println!("Exam {id} and its grades deleted.");
        }
        StoreCommand::AddGrade {
            exam,
            matricola,
            grade,
            lode,
        } => {
            let target = store
                .list_exams()
                .await?
                .into_iter()
                .find(|candidate| candidate.id == exam)
                .with_context(|| format!("no exam with id {exam}"))?;
            let value = parse_grade(target.use_letter_grades, &grade, lode)?;
            let created = store
                .add_grade(NewGrade {
                    matricola,
                    exam_id: target.id,
                    value,
                })
                .await?;
            println!(
                "Recorded {} for {} on '{}'.",
                grades::format_grade(&created),
                created.matricola,
                target.name
            );
        }
        StoreCommand::ImportStudents { csv } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let result = import::import_students(store, file).await?;
            println!(
                "Imported {} students from {} ({} already registered, {} errors).",
                result.imported,
                csv.display(),
                result.skipped,
                result.errors
            );
        }
        StoreCommand::ImportGrades { exam, csv, header } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let result = import::import_grades(store, exam, file, header).await?;
            println!(
                "Imported {} grades from {} ({} errors).",
                result.imported,
                csv.display(),
                result.errors
            );
        }
        StoreCommand::Dashboard { exam, json } => {
            let dashboard = analytics::load_dashboard(store, exam).await?;
            if json {
                return print_json(&dashboard);
            }

            println!(
                "Students: {} registered, {} with grades",
                dashboard.counts.registered_students, dashboard.counts.students_with_grades
            );
            println!(
                "Exams: {}  Grades: {}",
                dashboard.counts.exams, dashboard.counts.grades
            );
            println!(
                "Average {:.2}, {} passed, {} failed ({:.2}% pass rate)",
                dashboard.stats.average,
                dashboard.stats.passing,
                dashboard.stats.failing,
                dashboard.stats.passing_percentage
            );
            for (grade, count) in dashboard.stats.distribution.iter() {
                println!("  {grade:>4}: {count}");
            }
        }
        StoreCommand::Ranking { exam, limit, json } => {
            let snapshot = Snapshot::load(store).await?;
            let ranking = snapshot.student_ranking(exam);
            if json {
                return print_json(&ranking);
            }

            if ranking.is_empty() {
                println!("No students with passing grades in this scope.");
                return Ok(());
            }

            println!("Top students:");
            for (position, row) in ranking.iter().take(limit).enumerate() {
                println!(
                    "{:>3}. {} ({}) {:.2} over {} grades",
                    position + 1,
                    row.display_name(),
                    row.matricola,
                    row.average,
                    row.grades.len()
                );
            }
        }
        StoreCommand::ExamRanking { json } => {
            let snapshot = Snapshot::load(store).await?;
            let ranking = snapshot.exam_ranking();
            if json {
                return print_json(&ranking);
            }

            for (position, row) in ranking.iter().enumerate() {
                println!(
                    "{:>3}. {} ({}) average {:.2}, {:.2}% passed, {} students",
                    position + 1,
                    row.exam.name,
                    row.exam.date,
                    row.stats.average,
                    row.stats.passing_percentage,
                    row.student_count
                );
            }
        }
        StoreCommand::Student { matricola, json } => {
            let snapshot = Snapshot::load(store).await?;
            let details = analytics::student_details(&snapshot, &matricola)
                .with_context(|| format!("no student or grades for matricola {matricola}"))?;
            if json {
                return print_json(&details);
            }

            println!("{} ({})", details.display_name(), details.matricola);
            println!("Average over passing grades: {:.2}", details.average);
            for entry in details.grades.iter() {
                println!(
                    "- {} {} ({}): {}",
                    entry.exam.date,
                    entry.exam.name,
                    entry.exam.kind.as_str(),
                    grades::format_grade(&entry.grade)
                );
            }
        }
        StoreCommand::Report { exam, out } => {
            let snapshot = Snapshot::load(store).await?;
            let report = report::build_report(&snapshot, exam);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
