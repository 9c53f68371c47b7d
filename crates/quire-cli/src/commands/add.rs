use quire_core::Note;

use crate::commands::common::{normalize_content, report_sync_outcome, resolve_note_content};
use crate::commands::App;
use crate::error::CliError;

pub async fn run_add(
    app: &App,
    title: Option<String>,
    notebook: Option<&str>,
    local_only: bool,
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;

    let mut note = Note::new(title.unwrap_or_default().trim(), content);
    note.is_local_only = local_only;
    if let Some(name) = notebook.and_then(normalize_content) {
        note.notebook_id = Some(app.db.get_or_create_notebook(&name).await?);
    }
    note.id = app.db.insert_note(&note).await?;

    println!("{}", note.id);
    report_sync_outcome("new note", &app.manager.create_note(&note).await);
    Ok(())
}
