use quire_core::sync::SyncError;

use crate::commands::common::load_note;
use crate::commands::App;
use crate::error::CliError;

pub async fn run_delete(app: &App, id: &str) -> Result<(), CliError> {
    let note = load_note(&app.db, id).await?;

    // The remote copy is located through the mapping, which dies with the note
    match app.manager.delete_note(&note).await {
        Ok(()) | Err(SyncError::SyncingNotEnabled) => {}
        Err(error) => {
            let mappings = app.db.get_mappings_for_note(note.id).await?;
            if mappings.iter().any(|mapping| mapping.is_assigned()) {
                return Err(CliError::RemoteCopyRemains(note.id, error));
            }
        }
    }
    app.db.delete_notes(&[note.id]).await?;

    println!("Deleted note {}", note.id);
    Ok(())
}
