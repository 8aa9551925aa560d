//! Application state: paths, configuration and the acting user

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use studio_core::{Actor, BookingService, CatalogSeed, Config, Database, Error, Result, Role};
use tracing::info;
use uuid::Uuid;

/// Everything one CLI invocation needs
pub struct AppState {
    pub service: BookingService,
    pub actor: Actor,
}

/// Where the database and config live, after env/flag overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub db: PathBuf,
    pub config: PathBuf,
}

impl Paths {
    pub fn resolve(db: Option<PathBuf>, config: Option<PathBuf>) -> Result<Self> {
        let (db, config) = match (db, config) {
            (Some(db), Some(config)) => (db, config),
            (db, config) => {
                let dirs = project_dirs()?;
                (
                    db.unwrap_or_else(|| dirs.data_dir().join("studio.db")),
                    config.unwrap_or_else(|| dirs.config_dir().join("studio.toml")),
                )
            }
        };
        Ok(Self { db, config })
    }
}

impl AppState {
    pub fn new(paths: &Paths, actor: Actor) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = paths.db.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config = Config::load_or_default(&paths.config)?;
        let db = Database::open(&paths.db)?;
        info!(db = %paths.db.display(), schema = db.schema_version(), "Database ready");

        Ok(Self {
            service: BookingService::new(db, config),
            actor,
        })
    }

    /// Load reference data from a TOML catalog
    pub fn seed(&self, path: &Path) -> Result<()> {
        let seed = CatalogSeed::load(path)?;
        seed.apply(self.service.db())
    }
}

/// Identity comes from the session layer; here, flags or environment
pub fn actor_from(name: &str, role: Role, id: Option<Uuid>) -> Actor {
    let mut actor = Actor::new(name.trim(), role);
    if let Some(id) = id {
        actor.id = id;
    }
    actor
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "studio", "studio").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine data directory",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_paths_skip_project_dirs() {
        let paths = Paths::resolve(Some("a.db".into()), Some("b.toml".into())).unwrap();
        assert_eq!(paths.db, PathBuf::from("a.db"));
        assert_eq!(paths.config, PathBuf::from("b.toml"));
    }

    #[test]
    fn test_state_opens_database_and_seeds() {
        let dir = TempDir::new().unwrap();
        let paths = Paths {
            db: dir.path().join("nested").join("studio.db"),
            config: dir.path().join("missing.toml"),
        };
        let seed_path = dir.path().join("catalog.toml");
        std::fs::write(
            &seed_path,
            "[[resources]]\nid = 1\nname = \"Studio A\"\ncategory = \"studio\"\n",
        )
        .unwrap();

        let state = AppState::new(&paths, actor_from("cli", Role::Admin, None)).unwrap();
        state.seed(&seed_path).unwrap();
        assert!(paths.db.exists());
        assert_eq!(state.service.config(), &Config::default());
    }

    #[test]
    fn test_actor_from_keeps_given_id() {
        let id = Uuid::new_v4();
        let actor = actor_from(" Mina ", Role::Manager, Some(id));
        assert_eq!(actor.id, id);
        assert_eq!(actor.display_name, "Mina");
    }
}
