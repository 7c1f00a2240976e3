use cadence_core::holidays::load_holiday_file;
use cadence_core::*;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Recurring session scheduler for patient care", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a patient and generate their sessions
    Add {
        /// Patient name
        name: String,

        /// Care nomenclature code
        #[arg(long, default_value = "")]
        nomenclature: String,

        /// Sessions take place at the patient's home
        #[arg(long)]
        home: bool,

        /// Home address
        #[arg(long)]
        address: Option<String>,

        /// First day of the course
        #[arg(long)]
        start: NaiveDate,

        #[command(flatten)]
        cadence: CadenceArgs,
    },

    /// List patients with their progress
    List {
        /// Only show patients whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Show a patient's sessions
    Show { patient: String },

    /// Change a session's status (scheduled, completed, absent, cancelled)
    Mark {
        patient: String,
        session: String,
        status: String,
    },

    /// Validate a session, making it final
    Lock { patient: String, session: String },

    /// Remove the validation from a session
    Unlock { patient: String, session: String },

    /// Move a session to another date and time
    Move {
        patient: String,
        session: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        time: String,
    },

    /// Change a patient's cadence and regenerate future sessions
    Edit {
        patient: String,

        /// New first day of the course
        #[arg(long)]
        start: Option<NaiveDate>,

        #[command(flatten)]
        cadence: EditCadenceArgs,

        /// Regenerate without asking for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Holiday calendar management
    Holidays {
        #[command(subcommand)]
        command: HolidayCommands,
    },

    /// Show the sessions of one day
    Day {
        /// Defaults to today
        date: Option<NaiveDate>,
    },

    /// List patients whose course ends soon
    Expiring,

    /// Export every session to CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum HolidayCommands {
    /// Import holiday files ({"YYYY-MM-DD": "name"}) and apply them
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Apply without asking for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List known holidays
    List,
}

#[derive(Args)]
struct CadenceArgs {
    /// Weekly slot as DAY@HH:MM (DAY is 0-6 with 0 = Sunday, or mon..sun)
    #[arg(long = "slot", required = true)]
    slots: Vec<String>,

    /// Number of sessions in the course
    #[arg(long, conflicts_with = "until", required_unless_present = "until")]
    sessions: Option<u32>,

    /// Last day of the course (inclusive)
    #[arg(long)]
    until: Option<NaiveDate>,
}

#[derive(Args)]
struct EditCadenceArgs {
    /// Replace the weekly slots (DAY@HH:MM, repeatable)
    #[arg(long = "slot")]
    slots: Vec<String>,

    /// Switch to a session-count course of this size
    #[arg(long, conflicts_with = "until")]
    sessions: Option<u32>,

    /// Switch to a date-range course ending on this day
    #[arg(long)]
    until: Option<NaiveDate>,
}

fn main() -> Result<()> {
    // Initialize logging
    cadence_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }
    let store = RosterStore::new(config.roster_path(), config.schedule.legacy_session_time);
    tracing::debug!("Using roster at {:?}", store.path());
    let today = cli
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Commands::Add {
            name,
            nomenclature,
            home,
            address,
            start,
            cadence,
        } => {
            let draft = PatientDraft {
                name,
                nomenclature,
                location: if home { Location::Home } else { Location::Cabinet },
                address,
                start_config: StartConfig {
                    start_date: start,
                    schedule: parse_slots(&cadence.slots)?,
                    duration: duration_from(cadence.sessions, cadence.until)?,
                },
            };
            cmd_add(&store, draft)
        }
        Commands::List { search } => cmd_list(&store, search.as_deref()),
        Commands::Show { patient } => cmd_show(&store, &patient),
        Commands::Mark {
            patient,
            session,
            status,
        } => cmd_mark(&store, &patient, &session, status.parse()?, today),
        Commands::Lock { patient, session } => cmd_lock(&store, &patient, &session, true),
        Commands::Unlock { patient, session } => cmd_lock(&store, &patient, &session, false),
        Commands::Move {
            patient,
            session,
            date,
            time,
        } => cmd_move(&store, &patient, &session, date, time.parse()?),
        Commands::Edit {
            patient,
            start,
            cadence,
            yes,
        } => cmd_edit(&store, &patient, start, cadence, yes, today),
        Commands::Holidays { command } => match command {
            HolidayCommands::Import { files, yes } => {
                cmd_holidays_import(&store, &files, yes, today)
            }
            HolidayCommands::List => cmd_holidays_list(&store),
        },
        Commands::Day { date } => cmd_day(&store, date.unwrap_or(today)),
        Commands::Expiring => cmd_expiring(&store, today, config.schedule.expiring_window_days),
        Commands::Export { out } => cmd_export(&store, &out),
    }
}

fn cmd_add(store: &RosterStore, draft: PatientDraft) -> Result<()> {
    let summary = store.update(|roster| {
        let patient = roster.create_patient(draft, &mut UuidIds)?;
        Ok(PatientSummary::of(patient))
    })?;

    println!(
        "✓ Created patient {} ({}) with {} sessions",
        summary.name, summary.id, summary.sessions
    );
    if let (Some(first), Some(last)) = (summary.first, summary.last) {
        println!("  From {} to {}", first, last);
    }
    Ok(())
}

fn cmd_list(store: &RosterStore, search: Option<&str>) -> Result<()> {
    let roster = store.load()?;
    let patients = match search {
        Some(term) => roster.search(term),
        None => roster.patients.iter().collect(),
    };

    if patients.is_empty() {
        println!("No patients found.");
        return Ok(());
    }

    for patient in patients {
        let progress = Progress::of(patient);
        println!(
            "{}  {}  {}/{} ({}%)",
            patient.id,
            patient.name,
            progress.completed,
            progress.total,
            progress.percent()
        );
    }
    Ok(())
}

fn cmd_show(store: &RosterStore, patient_id: &str) -> Result<()> {
    let roster = store.load()?;
    let patient = roster.patient(patient_id)?;

    println!("{} ({})", patient.name, patient.id);
    if !patient.nomenclature.is_empty() {
        println!("  Nomenclature: {}", patient.nomenclature);
    }
    println!("  Starts: {}", patient.start_config.start_date);
    match patient.start_config.duration {
        DurationPolicy::SessionCount { total } => println!("  Course: {} sessions", total),
        DurationPolicy::DateRange { end_date } => println!("  Course: until {}", end_date),
    }
    let slots: Vec<String> = patient
        .start_config
        .schedule
        .iter()
        .map(|s| format!("{}@{}", weekday_label(s.day), s.time))
        .collect();
    println!("  Weekly: {}", slots.join(", "));
    println!();

    for session in &patient.sessions {
        print_session(session);
    }
    Ok(())
}

fn cmd_mark(
    store: &RosterStore,
    patient_id: &str,
    session_id: &str,
    status: SessionStatus,
    today: NaiveDate,
) -> Result<()> {
    let makeup = store.update(|roster| {
        roster.update_session_status(patient_id, session_id, status, today, &mut UuidIds)
    })?;

    println!("✓ Session {} marked {}", session_id, status);
    if let Some(makeup) = makeup {
        println!("  Makeup session added: {} {}", makeup.date, makeup.time);
    }
    Ok(())
}

fn cmd_lock(store: &RosterStore, patient_id: &str, session_id: &str, locked: bool) -> Result<()> {
    store.update(|roster| roster.set_session_locked(patient_id, session_id, locked))?;

    if locked {
        println!("✓ Session {} validated", session_id);
    } else {
        println!("✓ Session {} unlocked", session_id);
    }
    Ok(())
}

fn cmd_move(
    store: &RosterStore,
    patient_id: &str,
    session_id: &str,
    date: NaiveDate,
    time: ClockTime,
) -> Result<()> {
    store.update(|roster| roster.reschedule_session(patient_id, session_id, date, time))?;
    println!("✓ Session {} moved to {} {}", session_id, date, time);
    Ok(())
}

fn cmd_edit(
    store: &RosterStore,
    patient_id: &str,
    start: Option<NaiveDate>,
    cadence: EditCadenceArgs,
    yes: bool,
    today: NaiveDate,
) -> Result<()> {
    let outcome = store.update(|roster| {
        let current = roster.patient(patient_id)?.start_config.clone();

        let schedule = if cadence.slots.is_empty() {
            current.schedule.clone()
        } else {
            parse_slots(&cadence.slots)?
        };
        let duration = if cadence.sessions.is_some() || cadence.until.is_some() {
            duration_from(cadence.sessions, cadence.until)?
        } else {
            current.duration.clone()
        };
        let new_config = StartConfig {
            start_date: start.unwrap_or(current.start_date),
            schedule,
            duration,
        };

        roster.edit_start_config(patient_id, new_config, today, &mut UuidIds, |patient| {
            yes || prompt_confirm(&format!(
                "The schedule of {} changed. Future unvalidated sessions will be regenerated. Continue?",
                patient.name
            ))
        })
    })?;

    match outcome {
        EditOutcome::Unchanged => println!("Schedule unchanged - nothing to do."),
        EditOutcome::Declined => println!("Regeneration cancelled - schedule kept as it was."),
        EditOutcome::Regenerated {
            discarded,
            generated,
        } => {
            println!("✓ Schedule updated");
            println!("  Removed {} future sessions, generated {}", discarded, generated);
        }
    }
    Ok(())
}

fn cmd_holidays_import(
    store: &RosterStore,
    files: &[PathBuf],
    yes: bool,
    today: NaiveDate,
) -> Result<()> {
    let mut merged = HolidayMap::new();
    for file in files {
        merged.extend(load_holiday_file(file)?);
    }

    if !yes
        && !prompt_confirm(&format!(
            "Import {} holidays and mark sessions on those days absent?",
            merged.len()
        ))
    {
        println!("Holiday import cancelled.");
        return Ok(());
    }

    let imported = merged.len();
    let (marked, makeups) =
        store.update(|roster| Ok(roster.sync_holidays(merged, today, &mut UuidIds)))?;

    println!("✓ Imported {} holidays", imported);
    println!("  {} sessions marked absent, {} makeup sessions added", marked, makeups);
    Ok(())
}

fn cmd_holidays_list(store: &RosterStore) -> Result<()> {
    let roster = store.load()?;
    if roster.holidays.is_empty() {
        println!("No holidays known.");
        return Ok(());
    }
    for (date, name) in &roster.holidays {
        println!("{}  {}", date, name);
    }
    Ok(())
}

fn cmd_day(store: &RosterStore, date: NaiveDate) -> Result<()> {
    let roster = store.load()?;
    let stats = roster.day_stats(date);

    println!(
        "{}: {} sessions, {} done, {} validated",
        date.format("%A %Y-%m-%d"),
        stats.total_scheduled,
        stats.total_completed,
        stats.total_locked
    );
    if let Some(name) = roster.holidays.get(&date) {
        println!("  Holiday: {}", name);
    }
    for (patient, session) in roster.sessions_on(date) {
        println!(
            "  {}  {}  {}{}",
            session.time,
            patient.name,
            session.status,
            if session.is_locked { " [validated]" } else { "" }
        );
    }
    Ok(())
}

fn cmd_expiring(store: &RosterStore, today: NaiveDate, window_days: i64) -> Result<()> {
    let roster = store.load()?;
    let expiring = roster.expiring(today, window_days);

    if expiring.is_empty() {
        println!("No courses ending in the next {} days.", window_days);
        return Ok(());
    }

    println!("Ending within {} days:", window_days);
    for patient in expiring {
        let last = patient
            .sessions
            .iter()
            .filter(|s| !s.is_cancelled())
            .map(|s| s.date)
            .max();
        if let Some(last) = last {
            println!("  {}  {}  last session {}", patient.id, patient.name, last);
        }
    }
    Ok(())
}

fn cmd_export(store: &RosterStore, out: &Path) -> Result<()> {
    let roster = store.load()?;
    let count = cadence_core::export::export_sessions_csv(&roster.patients, out)?;
    println!("✓ Exported {} sessions to {}", count, out.display());
    Ok(())
}

struct PatientSummary {
    id: String,
    name: String,
    sessions: usize,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
}

impl PatientSummary {
    fn of(patient: &Patient) -> Self {
        Self {
            id: patient.id.clone(),
            name: patient.name.clone(),
            sessions: patient.sessions.len(),
            first: patient.sessions.first().map(|s| s.date),
            last: patient.sessions.last().map(|s| s.date),
        }
    }
}

fn print_session(session: &Session) {
    let mut line = format!(
        "  {}  {} {}  {}",
        session.id,
        session.date.format("%a %Y-%m-%d"),
        session.time,
        session.status
    );
    if session.is_locked {
        line.push_str(" [validated]");
    }
    if let Some(ref notes) = session.notes {
        line.push_str("  ");
        line.push_str(notes);
    }
    println!("{}", line);
}

const WEEKDAY_LABELS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

fn weekday_label(day: u8) -> &'static str {
    WEEKDAY_LABELS.get(usize::from(day)).copied().unwrap_or("?")
}

/// Parse `DAY@HH:MM` where DAY is 0-6 (0 = Sunday) or a weekday name
fn parse_slot(raw: &str) -> Result<ScheduleConfig> {
    let (day, time) = raw
        .split_once('@')
        .ok_or_else(|| Error::Validation(format!("Slot '{}' must look like DAY@HH:MM", raw)))?;

    let day = day.trim().to_lowercase();
    let index = match day.parse::<u8>() {
        Ok(n) => n,
        Err(_) => WEEKDAY_LABELS
            .iter()
            .position(|label| day.starts_with(label))
            .map(|i| i as u8)
            .ok_or_else(|| Error::Validation(format!("Unknown weekday '{}'", day)))?,
    };

    ScheduleConfig::new(index, time.parse()?)
}

fn parse_slots(raw: &[String]) -> Result<Vec<ScheduleConfig>> {
    raw.iter().map(|s| parse_slot(s)).collect()
}

fn duration_from(sessions: Option<u32>, until: Option<NaiveDate>) -> Result<DurationPolicy> {
    match (sessions, until) {
        (Some(total), None) => Ok(DurationPolicy::SessionCount { total }),
        (None, Some(end_date)) => Ok(DurationPolicy::DateRange { end_date }),
        _ => Err(Error::Validation(
            "Give exactly one of --sessions or --until".into(),
        )),
    }
}

fn prompt_confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
