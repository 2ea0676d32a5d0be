use std::cell::{Cell, RefCell};
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params};

pub type ChangeListener = Box<dyn Fn(&str)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Key-value settings store backed by a single SQLite table.
///
/// Every `get_*` takes a default and is total over absent or wrongly-typed
/// values. Every `set_*` writes one key and is durable on its own once it
/// returns; there is no batching and no atomicity across keys.
pub struct SettingsStore {
    conn: Connection,
    listeners: RefCell<Vec<(ListenerId, ChangeListener)>>,
    next_listener: Cell<u64>,
}

impl SettingsStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open settings store at {}", path.display()))?;
        let store = Self::from_connection(conn);
        store.migrate()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.migrate()?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        }
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value
            );
            "#,
        )?;
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<Option<Value>> {
        let mut stmt = self.conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        self.notify(key);
        Ok(())
    }

    pub fn get_string(&self, key: &str, default: &str) -> Result<String> {
        Ok(match self.lookup(key)? {
            Some(Value::Text(text)) => text,
            _ => default.to_string(),
        })
    }

    pub fn get_i32(&self, key: &str, default: i32) -> Result<i32> {
        Ok(match self.lookup(key)? {
            Some(Value::Integer(n)) => i32::try_from(n).unwrap_or(default),
            _ => default,
        })
    }

    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64> {
        Ok(match self.lookup(key)? {
            Some(Value::Integer(n)) => n,
            _ => default,
        })
    }

    pub fn get_f32(&self, key: &str, default: f32) -> Result<f32> {
        Ok(match self.lookup(key)? {
            Some(Value::Real(x)) => x as f32,
            _ => default,
        })
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(match self.lookup(key)? {
            Some(Value::Integer(n)) => n != 0,
            _ => default,
        })
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, Value::Text(value.to_string()))
    }

    pub fn set_i32(&self, key: &str, value: i32) -> Result<()> {
        self.put(key, Value::Integer(i64::from(value)))
    }

    pub fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, Value::Integer(value))
    }

    pub fn set_f32(&self, key: &str, value: f32) -> Result<()> {
        self.put(key, Value::Real(f64::from(value)))
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, Value::Integer(i64::from(value)))
    }

    pub fn register_change_listener(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn unregister_change_listener(&self, id: ListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }

    fn notify(&self, key: &str) {
        for (_, listener) in self.listeners.borrow().iter() {
            listener(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn typed_values_round_trip() {
        let store = SettingsStore::open_in_memory().expect("in-memory store");
        store.set_string("s", "hello").unwrap();
        store.set_i32("i", -7).unwrap();
        store.set_i64("l", 5_000_000_000).unwrap();
        store.set_f32("f", 1.5).unwrap();
        store.set_bool("b", true).unwrap();

        assert_eq!(store.get_string("s", "").unwrap(), "hello");
        assert_eq!(store.get_i32("i", 0).unwrap(), -7);
        assert_eq!(store.get_i64("l", 0).unwrap(), 5_000_000_000);
        assert!((store.get_f32("f", 0.0).unwrap() - 1.5).abs() < f32::EPSILON);
        assert!(store.get_bool("b", false).unwrap());
    }

    #[test]
    fn absent_keys_yield_defaults() {
        let store = SettingsStore::open_in_memory().expect("in-memory store");
        assert_eq!(store.get_string("missing", "fallback").unwrap(), "fallback");
        assert_eq!(store.get_i32("missing", 3).unwrap(), 3);
        assert_eq!(store.get_i64("missing", -9).unwrap(), -9);
        assert!((store.get_f32("missing", 1.0).unwrap() - 1.0).abs() < f32::EPSILON);
        assert!(store.get_bool("missing", true).unwrap());
    }

    #[test]
    fn wrongly_typed_value_yields_default() {
        let store = SettingsStore::open_in_memory().expect("in-memory store");
        store.set_string("k", "not a number").unwrap();
        assert_eq!(store.get_i64("k", 11).unwrap(), 11);
        assert!((store.get_f32("k", 0.5).unwrap() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn overwrite_replaces_previous_value() {
        let store = SettingsStore::open_in_memory().expect("in-memory store");
        store.set_i32("k", 1).unwrap();
        store.set_i32("k", 2).unwrap();
        assert_eq!(store.get_i32("k", 0).unwrap(), 2);
    }

    #[test]
    fn listeners_fire_per_set_and_stop_after_unregister() {
        let store = SettingsStore::open_in_memory().expect("in-memory store");
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let id = store.register_change_listener(Box::new(move |key| {
            sink.borrow_mut().push(key.to_string());
        }));

        store.set_i32("a", 1).unwrap();
        store.set_bool("b", true).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["a", "b"]);

        store.unregister_change_listener(id);
        store.set_i32("a", 2).unwrap();
        assert_eq!(seen.borrow().len(), 2);
    }
}
