use std::{
    fs::create_dir_all,
    io,
    ops::{ControlFlow, RangeInclusive},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use include_dir::{Dir, include_dir};
use log::{debug, trace, warn};
use rusqlite::{Connection, ErrorCode, OptionalExtension, types::Type};
use rusqlite_migration::Migrations;

use crate::store::{Folder, StoreError};

static MIGRATIONS_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/migrations");

#[derive(Debug)]
struct Database(Mutex<Connection>);

impl Database {
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.0.lock().expect("database lock should be acquirable")
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Ok(db) = self.0.get_mut()
            && let Err(e) = db.execute_batch("pragma optimize;")
        {
            warn!("could not optimize message store: {e}");
        }
    }
}

/// SQLite database holding the messages of every folder.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        let state_file = Self::prepare_state_file(state_dir)?;
        debug!("opening message store {}", state_file.display());
        Self::try_new(Connection::open(state_file)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::try_new(Connection::open_in_memory()?)
    }

    fn try_new(mut db: Connection) -> Result<Self, StoreError> {
        db.execute_batch(
            "pragma journal_mode=wal;
            pragma synchronous=1;
            pragma foreign_keys=on;",
        )?;
        Migrations::from_directory(&MIGRATIONS_DIR)?.to_latest(&mut db)?;

        Ok(Self {
            db: Arc::new(Database(Mutex::new(db))),
        })
    }

    fn prepare_state_file(state_dir: &Path) -> io::Result<PathBuf> {
        create_dir_all(state_dir)?;

        Ok(state_dir.join("bmagent.db"))
    }

    /// Opens the folder called `name`, creating it if necessary.
    pub fn folder(&self, name: &str) -> Result<SqliteFolder, StoreError> {
        let db = self.db.lock();
        if db.execute("insert or ignore into folder (name) values (?1)", [name])? > 0 {
            debug!("created folder {name}");
        }

        Ok(SqliteFolder {
            name: name.to_string(),
            db: Arc::clone(&self.db),
        })
    }

    pub fn folder_names(&self) -> Result<Vec<String>, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare_cached("select name from folder order by name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

#[derive(Clone, Debug)]
pub struct SqliteFolder {
    name: String,
    db: Arc<Database>,
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    error.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

// sqlite integers are signed, ids and suffixes are stored as their i64 value
fn to_sql(value: u64) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_sql(column: usize, value: i64) -> rusqlite::Result<u64> {
    u64::try_from(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(e)))
}

impl Folder for SqliteFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        let db = self.db.lock();
        Ok(db.query_one(
            "select next_id from folder where name = ?1",
            [&self.name],
            |row| from_sql(0, row.get(0)?),
        )?)
    }

    fn for_each_message(
        &self,
        ids: RangeInclusive<u64>,
        suffix: u64,
        visit: &mut dyn FnMut(u64, u64, &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare_cached(
            "select id, content from message
            where folder = ?1 and id between ?2 and ?3 and suffix = ?4
            order by id",
        )?;
        // ids above i64::MAX cannot be stored
        let start = i64::try_from(*ids.start()).unwrap_or(i64::MAX);
        let end = i64::try_from(*ids.end()).unwrap_or(i64::MAX);
        let mut rows = stmt.query((&self.name, start, end, to_sql(suffix)?))?;
        while let Some(row) = rows.next()? {
            let id = from_sql(0, row.get(0)?)?;
            let content: Vec<u8> = row.get(1)?;
            if visit(id, suffix, &content).is_break() {
                trace!("stopped iterating {} at {id}", self.name);
                break;
            }
        }
        Ok(())
    }

    fn get_message(&self, id: u64) -> Result<(u64, Vec<u8>), StoreError> {
        let db = self.db.lock();
        let mut stmt =
            db.prepare_cached("select suffix, content from message where folder = ?1 and id = ?2")?;
        stmt.query_one((&self.name, to_sql(id)?), |row| {
            Ok((from_sql(0, row.get(0)?)?, row.get(1)?))
        })
        .optional()?
        .ok_or(StoreError::NotFound(id))
    }

    fn insert_new_message(&self, content: &[u8], suffix: u64) -> Result<u64, StoreError> {
        let mut db = self.db.lock();
        let tx = db.transaction()?;
        let id: i64 = tx.query_one(
            "update folder set next_id = next_id + 1 where name = ?1 returning next_id - 1",
            [&self.name],
            |row| row.get(0),
        )?;
        tx.execute(
            "insert into message (folder, id, suffix, content) values (?1, ?2, ?3, ?4)",
            (&self.name, id, to_sql(suffix)?, content),
        )?;
        tx.commit()?;
        let id = from_sql(0, id)?;
        trace!("inserted message {id} into {}", self.name);

        Ok(id)
    }

    fn insert_message(&self, id: u64, content: &[u8], suffix: u64) -> Result<(), StoreError> {
        let mut db = self.db.lock();
        let tx = db.transaction()?;
        let sql_id = to_sql(id)?;
        tx.execute(
            "insert into message (folder, id, suffix, content) values (?1, ?2, ?3, ?4)",
            (&self.name, sql_id, to_sql(suffix)?, content),
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Occupied(id)
            } else {
                e.into()
            }
        })?;
        tx.execute(
            "update folder set next_id = max(next_id, ?2 + 1) where name = ?1",
            (&self.name, sql_id),
        )?;
        tx.commit()?;
        trace!("inserted message {id} into {}", self.name);

        Ok(())
    }

    fn delete_message(&self, id: u64) -> Result<(), StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare_cached("delete from message where folder = ?1 and id = ?2")?;
        if stmt.execute((&self.name, to_sql(id)?))? == 0 {
            return Err(StoreError::NotFound(id));
        }
        trace!("deleted message {id} from {}", self.name);

        Ok(())
    }
}
