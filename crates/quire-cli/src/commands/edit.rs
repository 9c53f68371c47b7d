use crate::commands::common::{edit_in_editor, load_note, report_sync_outcome};
use crate::commands::App;
use crate::error::CliError;

pub async fn run_edit(app: &App, id: &str) -> Result<(), CliError> {
    let mut note = load_note(&app.db, id).await?;
    let original = note.body_text();

    let edited = edit_in_editor(&original)?.ok_or(CliError::EmptyEditedContent)?;
    if edited == original.trim() {
        println!("No changes");
        return Ok(());
    }

    note.set_body_text(&edited);
    note.touch();
    app.db.update_notes(std::slice::from_ref(&note)).await?;

    println!("{}", note.id);
    report_sync_outcome("edit", &app.manager.update_or_create(&note).await);
    Ok(())
}
