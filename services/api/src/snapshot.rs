use clap::Subcommand;
use sirepre::config::AppConfig;
use sirepre::error::AppError;
use sirepre::workflows::registration::{
    FileSnapshotStore, SnapshotPersistence, SnapshotStore, STORAGE_KEY,
};

#[derive(Subcommand, Debug)]
pub(crate) enum SnapshotCommand {
    /// Print the registration snapshot stored under PORTAL_SNAPSHOT_DIR
    Show,
    /// Delete the stored snapshot so the next session starts empty
    Clear,
}

pub(crate) fn run_snapshot(command: SnapshotCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = FileSnapshotStore::new(&config.portal.snapshot_dir);
    let path = store.path_for(STORAGE_KEY);

    match command {
        SnapshotCommand::Show => {
            let Some(snapshot) = SnapshotPersistence::new(store).load() else {
                println!("No registration snapshot at {}", path.display());
                return Ok(());
            };

            println!("Registration snapshot at {}", path.display());
            println!("- step: {}", snapshot.step.label());
            if !snapshot.verification.national_id.is_empty() {
                println!("- applicant: {}", snapshot.verification.display_id());
            }
            let pending = snapshot
                .form
                .documents
                .iter()
                .filter(|(_, file)| file.needs_reupload())
                .map(|(slot, _)| slot.label())
                .collect::<Vec<_>>();
            if !pending.is_empty() {
                println!("- select again: {}", pending.join(", "));
            }
            if let Some(receipt) = &snapshot.receipt {
                println!("- receipt: {}", receipt.as_str());
            }
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{json}"),
                Err(err) => println!("  Snapshot payload unavailable: {err}"),
            }
        }
        SnapshotCommand::Clear => {
            store.remove(STORAGE_KEY)?;
            println!("Removed {}", path.display());
        }
    }

    Ok(())
}
