//! Raw sqlx access to the `properties` table. Functions here know nothing
//! about the registry's business rules (status-transition legality, the
//! ledger, etc.) — they are the same thin, typed-row layer as
//! `database::orders` in the teacher: one function per statement, callers
//! decide transaction scope by choosing `&mut PgConnection` vs
//! `&mut PgTransaction`.

use {
    model::{
        ids::{PropertyId, UserId},
        property::PropertyStatus,
        NewProperty, Property, PropertyFilter, PropertyPatch,
    },
    sqlx::{types::Json, PgConnection},
};

pub async fn insert(ex: &mut PgConnection, new: &NewProperty) -> sqlx::Result<Property> {
    sqlx::query_as::<_, Property>(
        "INSERT INTO properties (
            serial_number, name, description, nsn, lin, manufacturer, part_number,
            unit_price, quantity, location, category, unit_of_issue, security_classification,
            assigned_to_user_id, current_status, condition, is_attachable, attachment_points,
            compatible_with, source_type, source_ref, source_document_url, import_metadata,
            verified, verified_at, verified_by
         ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19,
            $20, $21, $22, $23, $24, CASE WHEN $24 THEN now() ELSE NULL END,
            CASE WHEN $24 THEN $14 ELSE NULL END
         ) RETURNING *",
    )
    .bind(&new.serial_number)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.nsn)
    .bind(&new.lin)
    .bind(&new.manufacturer)
    .bind(&new.part_number)
    .bind(&new.unit_price)
    .bind(new.quantity)
    .bind(&new.location)
    .bind(&new.category)
    .bind(&new.unit_of_issue)
    .bind(&new.security_classification)
    .bind(new.assigned_to_user_id)
    .bind(if new.assigned_to_user_id.is_some() {
        PropertyStatus::Assigned
    } else {
        PropertyStatus::Available
    })
    .bind(new.condition)
    .bind(new.is_attachable)
    .bind(&new.attachment_points)
    .bind(&new.compatible_with)
    .bind(new.source_type)
    .bind(&new.source_ref)
    .bind(&new.source_document_url)
    .bind(new.import_metadata.clone().map(Json))
    .bind(new.verified)
    .fetch_one(ex)
    .await
}

pub async fn get_by_id(ex: &mut PgConnection, id: PropertyId) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "SELECT * FROM properties WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(ex)
    .await
}

/// Row-locked read used by callers that will immediately follow up with a
/// write in the same transaction (registry update, attach, transfer accept).
pub async fn get_for_update(
    ex: &mut PgConnection,
    id: PropertyId,
) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "SELECT * FROM properties WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(ex)
    .await
}

pub async fn get_by_serial(
    ex: &mut PgConnection,
    serial_number: &str,
) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "SELECT * FROM properties WHERE serial_number = $1 AND deleted_at IS NULL",
    )
    .bind(serial_number)
    .fetch_optional(ex)
    .await
}

pub async fn list(ex: &mut PgConnection, filter: &PropertyFilter) -> sqlx::Result<Vec<Property>> {
    let like = filter.text.as_ref().map(|t| format!("%{t}%"));
    sqlx::query_as::<_, Property>(
        "SELECT * FROM properties
         WHERE deleted_at IS NULL
           AND ($1::BIGINT IS NULL OR assigned_to_user_id = $1)
           AND ($2::property_status IS NULL OR current_status = $2)
           AND ($3::TEXT IS NULL OR name ILIKE $3 OR serial_number ILIKE $3 OR nsn ILIKE $3)
         ORDER BY updated_at DESC
         LIMIT $4 OFFSET $5",
    )
    .bind(filter.assigned_to_user_id)
    .bind(filter.status)
    .bind(like)
    .bind(filter.limit.unwrap_or(100).clamp(1, 500))
    .bind(filter.offset.unwrap_or(0).max(0))
    .fetch_all(ex)
    .await
}

/// Applies a patch under optimistic concurrency control: the `UPDATE` only
/// matches the row if `version = expected_version`, so a concurrent writer
/// that already bumped the version makes this return `Ok(None)` rather than
/// silently clobbering it (spec.md §4.1 `VersionConflict`).
pub async fn apply_patch(
    ex: &mut PgConnection,
    id: PropertyId,
    patch: &PropertyPatch,
    expected_version: i64,
) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "UPDATE properties SET
            current_status = COALESCE($3, current_status),
            assigned_to_user_id = CASE
                WHEN $3::property_status = 'available' THEN NULL
                WHEN $3::property_status = 'assigned' THEN COALESCE($7, assigned_to_user_id)
                ELSE assigned_to_user_id
            END,
            condition = COALESCE($4, condition),
            condition_notes = COALESCE($5, condition_notes),
            location = COALESCE($6, location),
            version = version + 1,
            updated_at = now()
         WHERE id = $1 AND version = $2 AND deleted_at IS NULL
         RETURNING *",
    )
    .bind(id)
    .bind(expected_version)
    .bind(patch.current_status)
    .bind(patch.condition)
    .bind(&patch.condition_notes)
    .bind(&patch.location)
    .bind(patch.assigned_to_user_id)
    .fetch_optional(ex)
    .await
}

/// Reassigns custody atomically as part of the transfer-accept path
/// (spec.md §4.2); the only caller permitted to move `assigned -> assigned`
/// with a different holder.
pub async fn reassign(
    ex: &mut PgConnection,
    id: PropertyId,
    new_holder: UserId,
    expected_version: i64,
) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "UPDATE properties SET
            assigned_to_user_id = $3,
            current_status = 'assigned',
            version = version + 1,
            updated_at = now()
         WHERE id = $1 AND version = $2 AND deleted_at IS NULL
         RETURNING *",
    )
    .bind(id)
    .bind(expected_version)
    .bind(new_holder)
    .fetch_optional(ex)
    .await
}

/// Sets `current_status = 'available'`, clearing the holder. Currently
/// unused by `registry::detach` (spec.md: "child's custody is unchanged");
/// kept for callers that do need to vacate a property outright.
pub async fn set_available(
    ex: &mut PgConnection,
    id: PropertyId,
    expected_version: i64,
) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "UPDATE properties SET
            assigned_to_user_id = NULL,
            current_status = 'available',
            version = version + 1,
            updated_at = now()
         WHERE id = $1 AND version = $2 AND deleted_at IS NULL
         RETURNING *",
    )
    .bind(id)
    .bind(expected_version)
    .fetch_optional(ex)
    .await
}

pub async fn verify(
    ex: &mut PgConnection,
    id: PropertyId,
    verifier: UserId,
    corrected_serial: Option<&str>,
    corrected_nsn: Option<&str>,
) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "UPDATE properties SET
            verified = TRUE,
            verified_at = now(),
            verified_by = $2,
            serial_number = COALESCE($3, serial_number),
            nsn = COALESCE($4, nsn),
            version = version + 1,
            updated_at = now()
         WHERE id = $1 AND deleted_at IS NULL
         RETURNING *",
    )
    .bind(id)
    .bind(verifier)
    .bind(corrected_serial)
    .bind(corrected_nsn)
    .fetch_optional(ex)
    .await
}

pub async fn soft_delete(ex: &mut PgConnection, id: PropertyId) -> sqlx::Result<u64> {
    Ok(sqlx::query("UPDATE properties SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .execute(ex)
        .await?
        .rows_affected())
}

pub async fn discard(ex: &mut PgConnection, id: PropertyId) -> sqlx::Result<u64> {
    Ok(sqlx::query("DELETE FROM properties WHERE id = $1")
        .bind(id)
        .execute(ex)
        .await?
        .rows_affected())
}

pub fn is_duplicate_serial_error(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation()
        && db_err.constraint() == Some("properties_serial_number_key"))
}

/// Looks a provisional candidate up by its ingestion idempotency key
/// (spec.md §4.3: "keyed by `(form_id, line, quantity_index)`... will not
/// double-insert on retry"). `import_metadata`'s `line`/`quantity_index`
/// are queried out of the jsonb column since they have no column of their
/// own.
pub async fn find_by_source_line(
    ex: &mut PgConnection,
    form_id: &str,
    line: i32,
    quantity_index: i32,
) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(
        "SELECT * FROM properties
         WHERE source_ref = $1
           AND (import_metadata ->> 'line')::INT = $2
           AND (import_metadata ->> 'quantity_index')::INT = $3
           AND deleted_at IS NULL",
    )
    .bind(form_id)
    .bind(line)
    .bind(quantity_index)
    .fetch_optional(ex)
    .await
}

/// All non-deleted provisional rows for a given import form, used by the
/// batch-rejection path (`IMPORT_DISCARDED`) and by `list` filtered for
/// review queues.
pub async fn list_by_source_ref(
    ex: &mut PgConnection,
    form_id: &str,
) -> sqlx::Result<Vec<Property>> {
    sqlx::query_as::<_, Property>(
        "SELECT * FROM properties WHERE source_ref = $1 AND deleted_at IS NULL ORDER BY id",
    )
    .bind(form_id)
    .fetch_all(ex)
    .await
}
