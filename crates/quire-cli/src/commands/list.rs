use std::collections::HashMap;

use crate::commands::common::{format_note_line, note_to_list_item, now_seconds, NoteListItem};
use crate::commands::App;
use crate::error::CliError;

pub async fn run_list(app: &App, limit: usize, binned: bool, as_json: bool) -> Result<(), CliError> {
    // Already ordered by modification time, newest first
    let notes = app
        .db
        .get_all_notes()
        .await?
        .into_iter()
        .filter(|note| note.is_deleted == binned)
        .take(limit)
        .collect::<Vec<_>>();
    let now = now_seconds();

    if as_json {
        let notebooks = app
            .db
            .list_notebooks()
            .await?
            .into_iter()
            .map(|notebook| (notebook.id, notebook.name))
            .collect::<HashMap<_, _>>();
        let json_items = notes
            .iter()
            .map(|note| {
                let notebook = note
                    .notebook_id
                    .and_then(|id| notebooks.get(&id))
                    .map(String::as_str);
                note_to_list_item(note, notebook, now)
            })
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for note in &notes {
            println!("{}", format_note_line(note, now));
        }
    }

    Ok(())
}
