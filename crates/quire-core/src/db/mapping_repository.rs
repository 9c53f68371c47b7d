//! Id mapping store
//!
//! Persists the correlation between local note ids and remote note ids per
//! provider. Every operation runs in its own transaction so a sync attempt
//! never observes a half-applied batch.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{IdMapping, NoteId, ProviderKind};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

const MAPPING_COLUMNS: &str = "mapping_id, local_note_id, remote_note_id, provider, extras";

/// Trait for id mapping storage operations
pub trait MappingRepository {
    /// Insert new mappings
    fn insert(&self, mappings: &[IdMapping]) -> Result<()>;

    /// Overwrite mappings, matched by `mapping_id`
    fn update(&self, mappings: &[IdMapping]) -> Result<()>;

    /// Delete mappings, matched by `mapping_id`
    fn delete(&self, mappings: &[IdMapping]) -> Result<()>;

    /// Mapping of a local note under a provider
    fn get_by_local_id(&self, local_id: NoteId, provider: ProviderKind)
        -> Result<Option<IdMapping>>;

    /// Mapping of a remote note under a provider
    fn get_by_remote_id(&self, remote_id: &str, provider: ProviderKind)
        -> Result<Option<IdMapping>>;

    /// Every mapping assigned to a provider
    fn get_all_for_provider(&self, provider: ProviderKind) -> Result<Vec<IdMapping>>;

    /// Every mapping row of a local note, assigned or not
    fn get_all_for_note(&self, local_id: NoteId) -> Result<Vec<IdMapping>>;

    /// Link a local note to a remote note.
    ///
    /// Updates the note's existing mapping for the provider, or attaches the
    /// provider to an unassigned row of the note, and only inserts when
    /// neither exists.
    fn assign_provider_to_note(&self, mapping: &IdMapping) -> Result<()>;

    /// Clear provider and remote id of the notes' mappings under `provider`
    fn unassign_provider_from_notes(&self, provider: ProviderKind, local_ids: &[NoteId])
        -> Result<()>;

    /// Delete mappings pointing at local notes outside `live_ids`.
    ///
    /// Rows without a local note are kept. Returns the number of deleted rows.
    fn delete_if_local_id_not_in(&self, live_ids: &[NoteId]) -> Result<usize>;

    /// Unassign the provider's mappings whose remote id is not in `live_remote_ids`.
    ///
    /// Returns the local ids of the unassigned mappings.
    fn unassign_provider_from_remotely_deleted_notes(
        &self,
        provider: ProviderKind,
        live_remote_ids: &[String],
    ) -> Result<Vec<NoteId>>;
}

/// `SQLite` implementation of `MappingRepository`
pub struct SqliteMappingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMappingRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_mapping(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdMapping> {
        let provider = row
            .get::<_, Option<String>>(3)?
            .map(|name| {
                name.parse::<ProviderKind>().map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Text, error.into())
                })
            })
            .transpose()?;

        Ok(IdMapping {
            mapping_id: row.get(0)?,
            local_note_id: row.get::<_, Option<i64>>(1)?.map(NoteId::new),
            remote_note_id: row.get(2)?,
            provider,
            extras: row.get(4)?,
        })
    }

    fn query_optional(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<IdMapping>> {
        let mapping = self
            .conn
            .query_row(sql, params, Self::parse_mapping)
            .optional()?;
        Ok(mapping)
    }

    fn all_rows(tx: &Transaction<'_>) -> Result<Vec<IdMapping>> {
        let mut stmt = tx.prepare(&format!("SELECT {MAPPING_COLUMNS} FROM id_mappings"))?;
        let rows = stmt
            .query_map([], Self::parse_mapping)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_row(conn: &Connection, mapping: &IdMapping) -> Result<()> {
        conn.execute(
            "INSERT INTO id_mappings (local_note_id, remote_note_id, provider, extras)
             VALUES (?, ?, ?, ?)",
            params![
                mapping.local_note_id.map(NoteId::get),
                mapping.remote_note_id,
                mapping.provider.map(ProviderKind::as_str),
                mapping.extras,
            ],
        )?;
        Ok(())
    }

    fn update_row(conn: &Connection, mapping: &IdMapping) -> Result<()> {
        conn.execute(
            "UPDATE id_mappings
             SET local_note_id = ?, remote_note_id = ?, provider = ?, extras = ?
             WHERE mapping_id = ?",
            params![
                mapping.local_note_id.map(NoteId::get),
                mapping.remote_note_id,
                mapping.provider.map(ProviderKind::as_str),
                mapping.extras,
                mapping.mapping_id,
            ],
        )?;
        Ok(())
    }

    fn clear_row(conn: &Connection, mapping_id: i64) -> Result<()> {
        conn.execute(
            "UPDATE id_mappings SET remote_note_id = NULL, provider = NULL, extras = NULL
             WHERE mapping_id = ?",
            params![mapping_id],
        )?;
        Ok(())
    }
}

impl MappingRepository for SqliteMappingRepository<'_> {
    fn insert(&self, mappings: &[IdMapping]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for mapping in mappings {
            Self::insert_row(&tx, mapping)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update(&self, mappings: &[IdMapping]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for mapping in mappings {
            Self::update_row(&tx, mapping)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, mappings: &[IdMapping]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for mapping in mappings {
            tx.execute(
                "DELETE FROM id_mappings WHERE mapping_id = ?",
                params![mapping.mapping_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_by_local_id(
        &self,
        local_id: NoteId,
        provider: ProviderKind,
    ) -> Result<Option<IdMapping>> {
        self.query_optional(
            &format!(
                "SELECT {MAPPING_COLUMNS} FROM id_mappings WHERE local_note_id = ? AND provider = ?"
            ),
            params![local_id.get(), provider.as_str()],
        )
    }

    fn get_by_remote_id(
        &self,
        remote_id: &str,
        provider: ProviderKind,
    ) -> Result<Option<IdMapping>> {
        self.query_optional(
            &format!(
                "SELECT {MAPPING_COLUMNS} FROM id_mappings WHERE remote_note_id = ? AND provider = ?"
            ),
            params![remote_id, provider.as_str()],
        )
    }

    fn get_all_for_provider(&self, provider: ProviderKind) -> Result<Vec<IdMapping>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MAPPING_COLUMNS} FROM id_mappings WHERE provider = ? ORDER BY mapping_id"
        ))?;
        let mappings = stmt
            .query_map(params![provider.as_str()], Self::parse_mapping)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(mappings)
    }

    fn get_all_for_note(&self, local_id: NoteId) -> Result<Vec<IdMapping>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MAPPING_COLUMNS} FROM id_mappings WHERE local_note_id = ? ORDER BY mapping_id"
        ))?;
        let mappings = stmt
            .query_map(params![local_id.get()], Self::parse_mapping)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(mappings)
    }

    fn assign_provider_to_note(&self, mapping: &IdMapping) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        let existing = match (mapping.local_note_id, mapping.provider) {
            (Some(local_id), Some(provider)) => tx
                .query_row(
                    &format!(
                        "SELECT {MAPPING_COLUMNS} FROM id_mappings
                         WHERE local_note_id = ?1 AND (provider = ?2 OR provider IS NULL)
                         ORDER BY provider IS NULL, mapping_id
                         LIMIT 1"
                    ),
                    params![local_id.get(), provider.as_str()],
                    Self::parse_mapping,
                )
                .optional()?,
            _ => None,
        };

        match existing {
            Some(row) => Self::update_row(
                &tx,
                &IdMapping {
                    mapping_id: row.mapping_id,
                    ..mapping.clone()
                },
            )?,
            None => Self::insert_row(&tx, mapping)?,
        }

        tx.commit()?;
        Ok(())
    }

    fn unassign_provider_from_notes(
        &self,
        provider: ProviderKind,
        local_ids: &[NoteId],
    ) -> Result<()> {
        let targets = local_ids.iter().copied().collect::<HashSet<_>>();
        let tx = self.conn.unchecked_transaction()?;

        let rows = Self::all_rows(&tx)?;
        let mut kept = rows
            .iter()
            .filter(|row| row.provider.is_none())
            .filter_map(|row| row.local_note_id)
            .collect::<HashSet<_>>();
        for row in rows {
            if row.provider != Some(provider) {
                continue;
            }
            let Some(local_id) = row.local_note_id.filter(|id| targets.contains(id)) else {
                continue;
            };
            // One unassigned row per note is enough to remember it was synced
            if kept.insert(local_id) {
                Self::clear_row(&tx, row.mapping_id)?;
            } else {
                tx.execute(
                    "DELETE FROM id_mappings WHERE mapping_id = ?",
                    params![row.mapping_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_if_local_id_not_in(&self, live_ids: &[NoteId]) -> Result<usize> {
        let live = live_ids.iter().copied().collect::<HashSet<_>>();
        let tx = self.conn.unchecked_transaction()?;

        let mut deleted = 0;
        for row in Self::all_rows(&tx)? {
            if row.local_note_id.is_some_and(|id| !live.contains(&id)) {
                deleted += tx.execute(
                    "DELETE FROM id_mappings WHERE mapping_id = ?",
                    params![row.mapping_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(deleted)
    }

    fn unassign_provider_from_remotely_deleted_notes(
        &self,
        provider: ProviderKind,
        live_remote_ids: &[String],
    ) -> Result<Vec<NoteId>> {
        let live = live_remote_ids
            .iter()
            .map(String::as_str)
            .collect::<HashSet<_>>();
        let tx = self.conn.unchecked_transaction()?;

        let mut unassigned = Vec::new();
        for row in Self::all_rows(&tx)? {
            if row.provider != Some(provider) {
                continue;
            }
            let still_remote = row
                .remote_note_id
                .as_deref()
                .is_some_and(|remote_id| live.contains(remote_id));
            if !still_remote {
                Self::clear_row(&tx, row.mapping_id)?;
                unassigned.extend(row.local_note_id);
            }
        }

        tx.commit()?;
        Ok(unassigned)
    }
}
