use crate::commands::common::{load_note, report_sync_outcome};
use crate::commands::App;
use crate::error::CliError;

pub async fn run_bin(app: &App, id: &str) -> Result<(), CliError> {
    let note = load_note(&app.db, id).await?;
    if note.is_deleted {
        println!("Note {} is already in the bin", note.id);
        return Ok(());
    }

    app.db.move_notes_to_bin(&[note.id]).await?;
    let binned = load_note(&app.db, id).await?;

    println!("Moved note {} to the bin", binned.id);
    report_sync_outcome("bin", &app.manager.move_note_to_bin(&binned).await);
    Ok(())
}

pub async fn run_restore(app: &App, id: &str) -> Result<(), CliError> {
    let note = load_note(&app.db, id).await?;
    if !note.is_deleted {
        println!("Note {} is not in the bin", note.id);
        return Ok(());
    }

    app.db.restore_notes(&[note.id]).await?;
    let restored = load_note(&app.db, id).await?;

    println!("Restored note {}", restored.id);
    report_sync_outcome("restore", &app.manager.restore_note(&restored).await);
    Ok(())
}
