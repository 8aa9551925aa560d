//! Reference data: resources, type compatibility, requester directory

use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use super::parse::parse_enum;
use crate::error::Result;
use crate::models::{Compatibility, Requester, Resource};

pub struct CatalogStore<'a> {
    conn: &'a Connection,
}

impl<'a> CatalogStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, resource), fields(resource_id = resource.id))]
    pub fn upsert_resource(&self, resource: &Resource) -> Result<()> {
        self.conn.execute(
            "INSERT INTO resources (id, name, category, is_active) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                is_active = excluded.is_active",
            params![
                resource.id,
                resource.name,
                resource.category.as_str(),
                resource.is_active as i32
            ],
        )?;
        Ok(())
    }

    pub fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, category, is_active FROM resources ORDER BY id")?;
        let resources = stmt
            .query_map([], |row| {
                Ok(Resource {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: parse_enum(&row.get::<_, String>(2)?)?,
                    is_active: row.get::<_, i32>(3)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(resources)
    }

    #[instrument(skip(self, compat), fields(shoot_type = %compat.shoot_type, resource_id = compat.resource_id))]
    pub fn upsert_compatibility(&self, compat: &Compatibility) -> Result<()> {
        self.conn.execute(
            "INSERT INTO type_compat (shoot_type, resource_id, is_primary) VALUES (?1, ?2, ?3)
             ON CONFLICT(shoot_type, resource_id) DO UPDATE SET is_primary = excluded.is_primary",
            params![compat.shoot_type, compat.resource_id, compat.primary as i32],
        )?;
        Ok(())
    }

    /// Active resources able to host `shoot_type`, lowest id first
    #[instrument(skip(self))]
    pub fn compatible_resources(&self, shoot_type: &str) -> Result<Vec<Compatibility>> {
        let mut stmt = self.conn.prepare(
            "SELECT tc.shoot_type, tc.resource_id, tc.is_primary
             FROM type_compat tc
             JOIN resources r ON r.id = tc.resource_id
             WHERE tc.shoot_type = ?1 AND r.is_active = 1
             ORDER BY tc.resource_id",
        )?;
        let rows = stmt
            .query_map(params![shoot_type.trim()], |row| {
                Ok(Compatibility {
                    shoot_type: row.get(0)?,
                    resource_id: row.get(1)?,
                    primary: row.get::<_, i32>(2)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn upsert_requester(&self, requester: &Requester) -> Result<()> {
        self.conn.execute(
            "INSERT INTO requesters (id, name, category) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, category = excluded.category",
            params![requester.id, requester.name, requester.category],
        )?;
        Ok(())
    }

    /// Case-insensitive exact match; the first id wins on duplicates
    pub fn find_requester_by_name(&self, name: &str) -> Result<Option<Requester>> {
        let requester = self
            .conn
            .query_row(
                "SELECT id, name, category FROM requesters
                 WHERE lower(trim(name)) = lower(?1)
                 ORDER BY id LIMIT 1",
                params![name.trim()],
                |row| {
                    Ok(Requester {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        category: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(requester)
    }
}
