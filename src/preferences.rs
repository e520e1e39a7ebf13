use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::cmp::Ordering;
use std::error::Error;
use std::path::Path;
use std::str::FromStr;

/* Key-value store for the map screen's preferences. It is read once at startup
to build a `MapConfig`, and written back when the user changes something.
Values are stored as text and parsed with `FromStr` on the way out.
*/

pub const FILE_NAME: &str = "preferences.db";

#[allow(clippy::type_complexity)]
fn run_migration(
    conn: &mut Connection,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "CREATE TABLE IF NOT EXISTS `db_metadata` (
        `key`	TEXT NOT NULL,
        `value`	TEXT,
        PRIMARY KEY(`key`)
        )",
        (),
    )?;
    let version_str: Option<String> = tx
        .query_row(
            "SELECT `value` FROM `db_metadata` WHERE key='version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let version: usize = match version_str {
        None => 0,
        Some(s) => s.parse()?,
    };
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, f) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                f(&tx)?;
            }
            tx.execute(
                "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
                ("version", target_version.to_string()),
            )?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(())
}

pub struct PreferenceStore {
    conn: Connection,
}

impl PreferenceStore {
    pub fn open(support_dir: &str) -> Result<PreferenceStore> {
        debug!("opening preference store in {}", support_dir);
        let conn = Connection::open(Path::new(support_dir).join(FILE_NAME))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<PreferenceStore> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<PreferenceStore> {
        run_migration(
            &mut conn,
            &[&|tx| {
                tx.execute(
                    "CREATE TABLE setting (
                        key     TEXT    PRIMARY KEY
                                        NOT NULL
                                        UNIQUE,
                        value   TEXT
                    );",
                    (),
                )?;
                Ok(())
            }],
        )?;
        Ok(PreferenceStore { conn })
    }

    pub fn get_setting<T: FromStr>(&self, setting: Setting) -> Result<Option<T>>
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        let result: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM setting WHERE key = ?1;",
                [setting.to_db_key()],
                |row| row.get(0),
            )
            .optional()?;
        match result {
            None => Ok(None),
            Some(s) => {
                let v = FromStr::from_str(&s)?;
                Ok(Some(v))
            }
        }
    }

    pub fn get_setting_with_default<T: FromStr>(&self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.get_setting(setting) {
            Ok(v) => v,
            Err(error) => {
                warn!(
                    "[preferences.get_setting_with_default] setting:{:?}, error:{}",
                    setting, error
                );
                None
            }
        }
        .unwrap_or(default)
    }

    pub fn set_setting<T: ToString>(&mut self, setting: Setting, value: T) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO setting (key, value) VALUES (?1, ?2);",
            (setting.to_db_key(), value.to_string()),
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove_setting(&mut self, setting: Setting) -> Result<()> {
        self.conn
            .execute("DELETE FROM setting WHERE key = ?1;", [setting.to_db_key()])?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    UserAgent,
    TileSource,
    TileCacheDir,
    UseDataConnection,
    MultiTouchControls,
    ShowZoomButtons,
    CenterLatitude,
    CenterLongitude,
    Zoom,
    RoutingServiceUrl,
    RequestTimeoutMs,
    MaxRetries,
    RouteOverlayPolicy,
    LocationAccuracyThreshold,
}

impl Setting {
    fn to_db_key(self) -> &'static str {
        match self {
            Self::UserAgent => "USER_AGENT",
            Self::TileSource => "TILE_SOURCE",
            Self::TileCacheDir => "TILE_CACHE_DIR",
            Self::UseDataConnection => "USE_DATA_CONNECTION",
            Self::MultiTouchControls => "MULTI_TOUCH_CONTROLS",
            Self::ShowZoomButtons => "SHOW_ZOOM_BUTTONS",
            Self::CenterLatitude => "CENTER_LATITUDE",
            Self::CenterLongitude => "CENTER_LONGITUDE",
            Self::Zoom => "ZOOM",
            Self::RoutingServiceUrl => "ROUTING_SERVICE_URL",
            Self::RequestTimeoutMs => "REQUEST_TIMEOUT_MS",
            Self::MaxRetries => "MAX_RETRIES",
            Self::RouteOverlayPolicy => "ROUTE_OVERLAY_POLICY",
            Self::LocationAccuracyThreshold => "LOCATION_ACCURACY_THRESHOLD",
        }
    }
}
