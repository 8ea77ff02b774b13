use std::path::PathBuf;

use actrec_core::recording::RecordingSession;
use actrec_core::storage::{Config, Database, RecordStore};
use actrec_core::{Activity, Category, Result, StoreError};
use clap::Subcommand;

use super::load_catalog;

#[derive(Subcommand)]
pub enum RecordsAction {
    /// List persisted records, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove one record
    Remove {
        /// Record id
        id: i64,
    },
    /// Remove every record of an activity
    RemoveActivity {
        /// Activity id
        id: i64,
        /// Catalog used to resolve the activity
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Remove every record of a category
    RemoveCategory {
        /// Category id
        id: i64,
        /// Catalog used to resolve the category
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Remove all records
    Clear,
}

pub fn run(action: RecordsAction) -> Result<()> {
    let mut session = RecordingSession::new(Database::open()?, Config::load()?);

    match action {
        RecordsAction::List { json } => {
            let records = session.store().list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("no records");
            } else {
                for r in &records {
                    println!(
                        "#{} activity={} category={} started={} elapsed={}s reps={} distance={:.1}m note={:?}",
                        r.id.unwrap_or_default(),
                        r.activity_id,
                        r.category_id,
                        r.started_at.format("%Y-%m-%d %H:%M"),
                        r.elapsed_secs,
                        r.repetitions,
                        r.distance_m,
                        r.note,
                    );
                }
            }
        }
        RecordsAction::Remove { id } => {
            let record = session
                .store()
                .get(id)?
                .ok_or(StoreError::NotFound(id))?;
            session.remove(&record)?;
            println!("record {id} removed");
        }
        RecordsAction::RemoveActivity { id, catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let activity = match catalog.activity(id) {
                Some(activity) => activity.clone(),
                None => {
                    // Records may outlive their catalog entry.
                    let category_id = session
                        .store()
                        .list()?
                        .iter()
                        .find(|r| r.activity_id == id)
                        .map(|r| r.category_id)
                        .unwrap_or_default();
                    Activity::new(id, "", category_id)
                }
            };
            let removed = session.remove_by_activity(&activity)?;
            println!("{removed} record(s) removed");
        }
        RecordsAction::RemoveCategory { id, catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let category = catalog.category(id).cloned().unwrap_or(Category {
                id,
                name: String::new(),
                color: String::new(),
            });
            let removed = session.remove_by_category(&category)?;
            println!("{removed} record(s) removed");
        }
        RecordsAction::Clear => {
            let removed = session.remove_all()?;
            println!("{removed} record(s) removed");
        }
    }
    Ok(())
}
