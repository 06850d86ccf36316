//! Material root row operations and aggregate loading
//!
//! Property blocks and tools live inline on the row as JSON text. Loading
//! an aggregate reads the root row and then its dependents.

use std::collections::BTreeSet;

use materia_common::db::{Material, MaterialSummary, ModerationState};
use materia_common::properties::{decode_stored, encode};
use materia_common::{time, Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use uuid::Uuid;

use super::{collaborators, gallery, steps, users};

const MATERIAL_COLUMNS: &str = r#"
    m.id, m.name, m.description, m.tools, m.composition,
    m.mechanical_properties, m.perceptual_properties, m.emotional_properties,
    m.derived_from, m.creator_id, m.moderation_state, m.created_at, m.updated_at
"#;

/// Optional constraints for material listings
#[derive(Debug, Default, Clone)]
pub struct MaterialFilter {
    pub state: Option<ModerationState>,
    pub creator_id: Option<String>,
    pub derived_from: Option<Uuid>,
}

impl MaterialFilter {
    pub fn approved() -> Self {
        Self {
            state: Some(ModerationState::Approved),
            ..Self::default()
        }
    }
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt {} '{}': {}", column, value, e)))
}

/// Root row only; dependents are empty
fn material_from_row(row: &SqliteRow) -> Result<Material> {
    let id: String = row.get("id");
    let derived_from: Option<String> = row.get("derived_from");
    let state: String = row.get("moderation_state");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Material {
        id: parse_uuid("materials.id", &id)?,
        name: row.get("name"),
        description: row.get("description"),
        tools: decode_stored("tools", row.get("tools"))?,
        composition: decode_stored("composition", row.get("composition"))?,
        mechanical_properties: decode_stored("mechanical_properties", row.get("mechanical_properties"))?,
        perceptual_properties: decode_stored("perceptual_properties", row.get("perceptual_properties"))?,
        emotional_properties: decode_stored("emotional_properties", row.get("emotional_properties"))?,
        derived_from: derived_from
            .as_deref()
            .map(|value| parse_uuid("materials.derived_from", value))
            .transpose()?,
        creator_id: row.get("creator_id"),
        creator: None,
        moderation_state: state.parse()?,
        collaborators: Vec::new(),
        gallery: Vec::new(),
        steps: Vec::new(),
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

/// Insert the root row of a new material
pub async fn insert_material(conn: &mut SqliteConnection, material: &Material) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO materials (
            id, name, description, tools, composition,
            mechanical_properties, perceptual_properties, emotional_properties,
            derived_from, creator_id, moderation_state, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(material.id.to_string())
    .bind(&material.name)
    .bind(&material.description)
    .bind(encode(&material.tools)?)
    .bind(encode(&material.composition)?)
    .bind(encode(&material.mechanical_properties)?)
    .bind(encode(&material.perceptual_properties)?)
    .bind(encode(&material.emotional_properties)?)
    .bind(material.derived_from.map(|id| id.to_string()))
    .bind(&material.creator_id)
    .bind(material.moderation_state.as_str())
    .bind(time::to_db(&material.created_at))
    .bind(time::to_db(&material.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rewrite every mutable root column
///
/// `creator_id` and `created_at` are not part of the statement.
pub async fn update_material(conn: &mut SqliteConnection, material: &Material) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE materials
        SET name = ?,
            description = ?,
            tools = ?,
            composition = ?,
            mechanical_properties = ?,
            perceptual_properties = ?,
            emotional_properties = ?,
            derived_from = ?,
            moderation_state = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&material.name)
    .bind(&material.description)
    .bind(encode(&material.tools)?)
    .bind(encode(&material.composition)?)
    .bind(encode(&material.mechanical_properties)?)
    .bind(encode(&material.perceptual_properties)?)
    .bind(encode(&material.emotional_properties)?)
    .bind(material.derived_from.map(|id| id.to_string()))
    .bind(material.moderation_state.as_str())
    .bind(time::to_db(&material.updated_at))
    .bind(material.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_moderation_state(
    conn: &mut SqliteConnection,
    id: Uuid,
    state: ModerationState,
) -> Result<bool> {
    let result = sqlx::query("UPDATE materials SET moderation_state = ?, updated_at = ? WHERE id = ?")
        .bind(state.as_str())
        .bind(time::now_db())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_material(conn: &mut SqliteConnection, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM materials WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn material_exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Number of materials created by a user, in any state
pub async fn count_by_creator(conn: &mut SqliteConnection, creator_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE creator_id = ?")
        .bind(creator_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn count_by_state(conn: &mut SqliteConnection, state: ModerationState) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE moderation_state = ?")
        .bind(state.as_str())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Root row without dependents
pub async fn fetch_root(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Material>> {
    let sql = format!("SELECT {} FROM materials m WHERE m.id = ?", MATERIAL_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(material_from_row).transpose()
}

/// Fill creator, collaborators, gallery and steps of a root row
async fn attach_dependents(conn: &mut SqliteConnection, material: &mut Material) -> Result<()> {
    material.creator = users::summary_any(conn, &material.creator_id).await?;
    material.collaborators = collaborators::list_collaborators(conn, material.id).await?;
    material.gallery = gallery::list_gallery(conn, material.id).await?;
    material.steps = steps::list_steps(conn, material.id).await?;
    Ok(())
}

/// Full aggregate
pub async fn load_material(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Material>> {
    match fetch_root(conn, id).await? {
        Some(mut material) => {
            attach_dependents(conn, &mut material).await?;
            Ok(Some(material))
        }
        None => Ok(None),
    }
}

/// Full aggregates matching a filter, newest first
pub async fn list_materials(conn: &mut SqliteConnection, filter: &MaterialFilter) -> Result<Vec<Material>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM materials m
        WHERE (?1 IS NULL OR m.moderation_state = ?1)
          AND (?2 IS NULL OR m.creator_id = ?2)
          AND (?3 IS NULL OR m.derived_from = ?3)
        ORDER BY m.created_at DESC, m.id
        "#,
        MATERIAL_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(filter.state.map(|s| s.as_str()))
        .bind(filter.creator_id.as_deref())
        .bind(filter.derived_from.map(|id| id.to_string()))
        .fetch_all(&mut *conn)
        .await?;

    let mut materials = rows.iter().map(material_from_row).collect::<Result<Vec<_>>>()?;
    for material in &mut materials {
        attach_dependents(conn, material).await?;
    }
    Ok(materials)
}

/// Catalog cards for approved materials with the first gallery image
pub async fn list_approved_summaries(conn: &mut SqliteConnection) -> Result<Vec<MaterialSummary>> {
    let sql = format!(
        r#"
        SELECT {},
            (SELECT g.image_url FROM material_gallery g
             WHERE g.material_id = m.id ORDER BY g.id LIMIT 1) AS cover_image_url
        FROM materials m
        WHERE m.moderation_state = 'approved'
        ORDER BY m.created_at DESC, m.id
        "#,
        MATERIAL_COLUMNS
    );

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| {
            let material = material_from_row(row)?;
            Ok(MaterialSummary {
                id: material.id,
                name: material.name,
                description: material.description,
                composition: material.composition,
                tools: material.tools,
                derived_from: material.derived_from,
                moderation_state: material.moderation_state,
                cover_image_url: row.get("cover_image_url"),
            })
        })
        .collect()
}

/// Distinct filter values over approved materials
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct FilterValues {
    pub tools: Vec<String>,
    pub composition_elements: Vec<String>,
}

/// Capitalize each whitespace-separated word
pub fn capitalize_words(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn approved_filter_values(conn: &mut SqliteConnection) -> Result<FilterValues> {
    let tools: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT j.value
        FROM materials m, json_each(m.tools) j
        WHERE m.moderation_state = 'approved'
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let elements: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT json_extract(j.value, '$.element')
        FROM materials m, json_each(m.composition) j
        WHERE m.moderation_state = 'approved'
          AND json_extract(j.value, '$.element') IS NOT NULL
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let normalize = |values: Vec<String>| {
        values
            .iter()
            .map(|v| capitalize_words(v))
            .filter(|v| !v.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
    };

    Ok(FilterValues {
        tools: normalize(tools),
        composition_elements: normalize(elements),
    })
}
