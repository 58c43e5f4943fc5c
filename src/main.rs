use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;

mod bucket;
mod calendar;
mod db;
mod labs;
mod median;
mod models;
mod pivot;
mod report;
mod summary;
mod units;

use db::{CourseCache, DateRange};
use models::{PivotedTable, SummaryRow};

#[derive(Parser)]
#[command(name = "tutors-time-report")]
#[command(about = "Student engagement time reports for Tutors courses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, ValueEnum)]
enum CalendarBy {
    Day,
    Week,
}

#[derive(Copy, Clone, ValueEnum)]
enum LabView {
    Lab,
    Step,
}

#[derive(Copy, Clone, ValueEnum)]
enum ExportView {
    Day,
    Week,
    Lab,
    Step,
}

#[derive(Copy, Clone, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize calendar engagement for a course
    Course {
        course_id: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = CalendarBy::Day)]
        by: CalendarBy,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show one student's engagement rows within a course
    Student {
        course_id: String,
        student_id: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Summarize lab/step time for a course
    Labs {
        course_id: String,
        #[arg(long, value_enum, default_value_t = LabView::Lab)]
        view: LabView,
    },
    /// Generate a markdown engagement report
    Report {
        course_id: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export a pivoted table as CSV or JSON
    Export {
        course_id: String,
        #[arg(long, value_enum, default_value_t = ExportView::Day)]
        view: ExportView,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the Tutors Postgres backend")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let mut cache = CourseCache::new();

    match cli.command {
        Commands::Course {
            course_id,
            start,
            end,
            by,
            limit,
        } => {
            let range = DateRange::new(start, end);
            let course = db::load_course(&pool, &mut cache, &course_id, range).await;
            if let Some(error) = &course.error {
                println!("Failed to load {course_id}: {error}");
                return Ok(());
            }

            let (table, median) = match by {
                CalendarBy::Day => (&course.calendar.day, &course.calendar.median_by_day),
                CalendarBy::Week => (&course.calendar.week, &course.calendar.median_by_week),
            };

            if table.rows.is_empty() {
                println!("No activity found for this window.");
                return Ok(());
            }

            println!("{} ({} students, {} columns)", course.title, table.rows.len(), table.keys.len());
            let mut by_total: Vec<_> = table.rows.iter().collect();
            by_total.sort_by(|a, b| b.total.cmp(&a.total));
            for row in by_total.iter().take(limit) {
                println!("- {} ({}) {} min", row.display_name, row.entity_id, row.total);
            }
            if let Some(median) = median {
                println!("Cohort median total: {} min", median.total);
            }
        }
        Commands::Student {
            course_id,
            student_id,
            start,
            end,
        } => {
            let range = DateRange::new(start, end);
            let student =
                db::load_student(&pool, &mut cache, &course_id, &student_id, range).await;

            if let Some(error) = &student.course.error {
                println!("Failed to load {course_id}: {error}");
                return Ok(());
            }
            if !student.has_data {
                println!(
                    "No activity found for {} in {}.",
                    student.student_name, student.course_title
                );
                return Ok(());
            }

            println!("{} in {}", student.student_name, student.course_title);
            println!("Calendar total: {} min", student.calendar_by_day.total);
            for (week, minutes) in &student.calendar_by_week.buckets {
                if *minutes > 0 {
                    println!("- w/c {week}: {minutes} min");
                }
            }
            if let Some(lab_row) = &student.labs_by_lab {
                println!("Lab total: {} min", lab_row.total);
                for (lab, minutes) in &lab_row.buckets {
                    if *minutes > 0 {
                        println!("- {lab}: {minutes} min");
                    }
                }
            }
        }
        Commands::Labs { course_id, view } => {
            let course =
                db::load_course(&pool, &mut cache, &course_id, DateRange::default()).await;
            if let Some(error) = &course.labs.error {
                println!("Failed to load lab records for {course_id}: {error}");
                return Ok(());
            }
            if !course.labs.has_data() {
                println!("No lab activity found.");
                return Ok(());
            }

            let (table, median) = match view {
                LabView::Lab => (&course.labs.lab, &course.labs.median_by_lab),
                LabView::Step => (&course.labs.step, &course.labs.median_by_step),
            };

            println!("{} ({} students)", course.title, table.rows.len());
            for key in &table.keys {
                let label = match view {
                    LabView::Lab => key.clone(),
                    LabView::Step => labs::extract_step_name(key),
                };
                let median_minutes = median
                    .as_ref()
                    .and_then(|row| row.buckets.get(key))
                    .copied()
                    .unwrap_or(0);
                println!("- {label}: median {median_minutes} min");
            }
            if let Some(median) = median {
                println!("Cohort median total: {} min", median.total);
            }
        }
        Commands::Report {
            course_id,
            start,
            end,
            out,
        } => {
            let range = DateRange::new(start, end);
            let course = db::load_course(&pool, &mut cache, &course_id, range).await;
            let report = report::build_report(&course, range);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            course_id,
            view,
            format,
            out,
        } => {
            let course =
                db::load_course(&pool, &mut cache, &course_id, DateRange::default()).await;
            if let Some(error) = &course.error {
                println!("Failed to load {course_id}: {error}");
                return Ok(());
            }

            let (table, median): (&PivotedTable, Option<&SummaryRow>) = match view {
                ExportView::Day => (
                    &course.calendar.day,
                    course.calendar.median_by_day.as_ref(),
                ),
                ExportView::Week => (
                    &course.calendar.week,
                    course.calendar.median_by_week.as_ref(),
                ),
                ExportView::Lab => (&course.labs.lab, course.labs.median_by_lab.as_ref()),
                ExportView::Step => (&course.labs.step, course.labs.median_by_step.as_ref()),
            };

            match format {
                ExportFormat::Csv => match out {
                    Some(path) => {
                        let file = std::fs::File::create(&path)
                            .with_context(|| format!("failed to create {}", path.display()))?;
                        report::write_csv(file, table, median)?;
                        println!("Exported to {}.", path.display());
                    }
                    None => report::write_csv(std::io::stdout(), table, median)?,
                },
                ExportFormat::Json => {
                    let value = report::to_json(table, median);
                    let text = serde_json::to_string_pretty(&value)?;
                    match out {
                        Some(path) => {
                            std::fs::write(&path, text)
                                .with_context(|| format!("failed to write {}", path.display()))?;
                            println!("Exported to {}.", path.display());
                        }
                        None => println!("{text}"),
                    }
                }
            }
        }
    }

    Ok(())
}
