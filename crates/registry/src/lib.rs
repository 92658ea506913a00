//! Property Registry (spec.md §4.1): entities, invariants, and lifecycle.
//! Every mutation here runs inside one transaction that also appends the
//! corresponding ledger event (spec.md §4.4: "the two are written together
//! in the same transaction").

use {
    model::{
        ids::{PropertyComponentId, PropertyId, UserId},
        ledger::EventDetail,
        property::PropertyStatus,
        Error, NewProperty, Property, PropertyComponent, PropertyFilter, PropertyPatch, Result,
    },
    sqlx::PgPool,
};

fn validate_new(new: &NewProperty) -> Result<()> {
    if new.serial_number.trim().is_empty() {
        return Err(Error::validation("serial_number must not be empty"));
    }
    if new.name.trim().is_empty() {
        return Err(Error::validation("name must not be empty"));
    }
    if new.quantity < 1 {
        return Err(Error::validation("quantity must be at least 1"));
    }
    Ok(())
}

/// Legal edges of the status transition table (spec.md §4.1). Same-status
/// "transitions" are always legal no-ops; the Transfer-Engine-only
/// `assigned -> assigned` reassignment edge is gated separately in
/// `update`, not here.
fn legal_transition(from: PropertyStatus, to: PropertyStatus) -> bool {
    use PropertyStatus::*;
    if from == to {
        return true;
    }
    match from {
        Available => true,
        Assigned => true,
        InTransit => matches!(to, Available | Assigned | Lost | Damaged),
        Maintenance => matches!(to, Available | Retired | Lost | Damaged),
        Retired | Lost => false,
        Damaged => matches!(to, Maintenance),
    }
}

/// Requires unique `serial_number`; sets `version=1`; emits `CREATED`.
pub async fn create(pool: &PgPool, actor: UserId, new: NewProperty) -> Result<Property> {
    validate_new(&new)?;
    let mut tx = pool.begin().await.map_err(|e| Error::Internal(e.into()))?;

    let property = match database::properties::insert(&mut tx, &new).await {
        Ok(property) => property,
        Err(e) if database::properties::is_duplicate_serial_error(&e) => {
            return Err(Error::DuplicateSerial(new.serial_number));
        }
        Err(e) => return Err(Error::Internal(e.into())),
    };

    ledger::append(&mut tx, actor, property.id, EventDetail::Created)
        .await
        .map_err(|e| Error::Internal(e.into()))?;

    tx.commit().await.map_err(|e| Error::Internal(e.into()))?;
    Ok(property)
}

pub async fn get_by_id(pool: &PgPool, id: PropertyId) -> Result<Property> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::properties::get_by_id(&mut conn, id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("property {id}")))
}

pub async fn get_by_serial(pool: &PgPool, serial_number: &str) -> Result<Property> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::properties::get_by_serial(&mut conn, serial_number)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("property with serial {serial_number}")))
}

pub async fn list(pool: &PgPool, filter: &PropertyFilter) -> Result<Vec<Property>> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Internal(e.into()))?;
    database::properties::list(&mut conn, filter)
        .await
        .map_err(|e| Error::Internal(e.into()))
}

/// Optimistic-concurrency update. Permitted mutations: status, condition,
/// location, notes. `assigned_to_user_id` is only honored on the direct
/// `available -> assigned` edge; reassigning an already-`assigned` property
/// to someone else is reserved to the Transfer Engine (`NotPermitted`).
pub async fn update(
    pool: &PgPool,
    actor: UserId,
    id: PropertyId,
    patch: PropertyPatch,
    expected_version: i64,
) -> Result<Property> {
    let mut tx = pool.begin().await.map_err(|e| Error::Internal(e.into()))?;
    let current = database::properties::get_for_update(&mut tx, id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("property {id}")))?;

    if let Some(new_status) = patch.current_status {
        if new_status != current.current_status && !legal_transition(current.current_status, new_status) {
            return Err(Error::IllegalTransition {
                from: current.current_status,
                to: new_status,
            });
        }
    }

    let target_status = patch.current_status.unwrap_or(current.current_status);
    if let Some(new_assignee) = patch.assigned_to_user_id {
        if target_status != PropertyStatus::Assigned {
            return Err(Error::validation(
                "assigned_to_user_id is only valid together with status=assigned",
            ));
        }
        if current.current_status == PropertyStatus::Assigned
            && current.assigned_to_user_id != Some(new_assignee)
        {
            return Err(Error::not_permitted(
                "reassigning an already-assigned property to a different holder is reserved to the Transfer Engine",
            ));
        }
    }
    if target_status == PropertyStatus::Assigned
        && patch.assigned_to_user_id.or(current.assigned_to_user_id).is_none()
    {
        return Err(Error::validation(
            "assigned status requires a non-null assignee (I2)",
        ));
    }

    let status_changed = patch
        .current_status
        .is_some_and(|s| s != current.current_status);

    let updated = database::properties::apply_patch(&mut tx, id, &patch, expected_version)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::VersionConflict {
            expected: expected_version,
            found: current.version,
        })?;

    if status_changed {
        ledger::append(
            &mut tx,
            actor,
            id,
            EventDetail::StatusChange {
                prev: current.current_status,
                new: updated.current_status,
                reason: patch.status_change_reason.clone(),
            },
        )
        .await
        .map_err(|e| Error::Internal(e.into()))?;
    }

    tx.commit().await.map_err(|e| Error::Internal(e.into()))?;
    Ok(updated)
}

/// Enforces (I3) one active parent per child, (I6) shared custody with the
/// parent, and (I7) acyclicity. `position`, if given, must be an available
/// slot in the parent's `attachment_points`; the parent must be
/// `is_attachable`; the child's `compatible_with`, if non-empty, must match
/// the parent.
pub async fn attach(
    pool: &PgPool,
    actor: UserId,
    parent_id: PropertyId,
    child_id: PropertyId,
    position: Option<String>,
    attachment_type: Option<String>,
) -> Result<PropertyComponent> {
    if parent_id == child_id {
        return Err(Error::validation("a property cannot be its own component"));
    }
    let mut tx = pool.begin().await.map_err(|e| Error::Internal(e.into()))?;

    let parent = database::properties::get_for_update(&mut tx, parent_id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("property {parent_id}")))?;
    let child = database::properties::get_for_update(&mut tx, child_id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("property {child_id}")))?;

    if !parent.is_attachable {
        return Err(Error::validation("parent is not attachable"));
    }
    if database::property_components::get_by_child(&mut tx, child_id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .is_some()
    {
        return Err(Error::validation(
            "child already participates in a component edge (I3)",
        ));
    }
    if let Some(position) = &position {
        if !parent.attachment_points.iter().any(|slot| slot == position) {
            return Err(Error::validation(format!(
                "{position} is not one of the parent's attachment points"
            )));
        }
    }
    if !child.compatible_with.is_empty() {
        let compatible = child.compatible_with.iter().any(|pattern| {
            *pattern == parent.serial_number || parent.category.as_deref() == Some(pattern.as_str())
        });
        if !compatible {
            return Err(Error::validation("child is not compatible with parent"));
        }
    }
    if child.assigned_to_user_id != parent.assigned_to_user_id {
        return Err(Error::not_permitted(
            "component and parent must already share the same custody before attach (I6)",
        ));
    }

    let ancestors = database::property_components::ancestors(&mut tx, parent_id)
        .await
        .map_err(|e| Error::Internal(e.into()))?;
    if ancestors.contains(&child_id) {
        return Err(Error::validation(
            "attaching would create a component cycle (I7)",
        ));
    }

    let edge = database::property_components::attach(
        &mut tx,
        parent_id,
        child_id,
        actor,
        position.as_deref(),
        attachment_type.as_deref(),
    )
    .await
    .map_err(|e| Error::Internal(e.into()))?;

    tx.commit().await.map_err(|e| Error::Internal(e.into()))?;
    Ok(edge)
}

/// Removes the edge; the child's custody is unchanged. Emits
/// `COMPONENT_DETACHED`.
pub async fn detach(
    pool: &PgPool,
    actor: UserId,
    child_id: PropertyId,
) -> Result<PropertyComponent> {
    let mut tx = pool.begin().await.map_err(|e| Error::Internal(e.into()))?;
    let edge = database::property_components::detach(&mut tx, child_id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("component edge for child {child_id}")))?;

    ledger::append(
        &mut tx,
        actor,
        child_id,
        EventDetail::ComponentDetached {
            parent: edge.parent_id,
            child: edge.child_id,
        },
    )
    .await
    .map_err(|e| Error::Internal(e.into()))?;

    tx.commit().await.map_err(|e| Error::Internal(e.into()))?;
    Ok(edge)
}

/// Same-id alternative to `detach` for callers that only know the edge id.
pub async fn detach_by_id(
    pool: &PgPool,
    actor: UserId,
    edge_id: PropertyComponentId,
) -> Result<PropertyComponent> {
    let mut tx = pool.begin().await.map_err(|e| Error::Internal(e.into()))?;
    let edge = database::property_components::detach_by_id(&mut tx, edge_id)
        .await
        .map_err(|e| Error::Internal(e.into()))?
        .ok_or_else(|| Error::not_found(format!("component edge {edge_id}")))?;

    ledger::append(
        &mut tx,
        actor,
        edge.child_id,
        EventDetail::ComponentDetached {
            parent: edge.parent_id,
            child: edge.child_id,
        },
    )
    .await
    .map_err(|e| Error::Internal(e.into()))?;

    tx.commit().await.map_err(|e| Error::Internal(e.into()))?;
    Ok(edge)
}

/// Flips `verified` to true, recording `verified_at`/`verified_by`, and
/// overwrites `serial_number`/`nsn` with reviewer corrections. Idempotent:
/// repeat calls still succeed and still append an audit `VERIFIED` event.
pub async fn verify(
    pool: &PgPool,
    actor: UserId,
    id: PropertyId,
    corrected_serial: Option<&str>,
    corrected_nsn: Option<&str>,
) -> Result<Property> {
    let mut tx = pool.begin().await.map_err(|e| Error::Internal(e.into()))?;
    let updated = match database::properties::verify(&mut tx, id, actor, corrected_serial, corrected_nsn).await {
        Ok(Some(property)) => property,
        Ok(None) => return Err(Error::not_found(format!("property {id}"))),
        Err(e) if database::properties::is_duplicate_serial_error(&e) => {
            return Err(Error::DuplicateSerial(
                corrected_serial.unwrap_or_default().to_string(),
            ));
        }
        Err(e) => return Err(Error::Internal(e.into())),
    };

    ledger::append(&mut tx, actor, id, EventDetail::Verified)
        .await
        .map_err(|e| Error::Internal(e.into()))?;

    tx.commit().await.map_err(|e| Error::Internal(e.into()))?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_from_available_are_always_legal() {
        for to in [
            PropertyStatus::Assigned,
            PropertyStatus::InTransit,
            PropertyStatus::Maintenance,
            PropertyStatus::Retired,
            PropertyStatus::Lost,
            PropertyStatus::Damaged,
        ] {
            assert!(legal_transition(PropertyStatus::Available, to));
        }
    }

    #[test]
    fn terminal_statuses_only_escape_via_damaged_to_maintenance() {
        assert!(!legal_transition(PropertyStatus::Retired, PropertyStatus::Maintenance));
        assert!(!legal_transition(PropertyStatus::Lost, PropertyStatus::Maintenance));
        assert!(legal_transition(PropertyStatus::Damaged, PropertyStatus::Maintenance));
        assert!(!legal_transition(PropertyStatus::Retired, PropertyStatus::Available));
    }

    #[test]
    fn in_transit_cannot_go_to_maintenance_or_retired() {
        assert!(!legal_transition(PropertyStatus::InTransit, PropertyStatus::Maintenance));
        assert!(!legal_transition(PropertyStatus::InTransit, PropertyStatus::Retired));
        assert!(legal_transition(PropertyStatus::InTransit, PropertyStatus::Lost));
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_create_rejects_duplicate_serial() {
        let pool = PgPool::connect("postgresql://").await.unwrap();
        database::clear_DANGER(&pool).await.unwrap();

        let new = NewProperty {
            serial_number: "SN-1".to_string(),
            name: "Rifle".to_string(),
            quantity: 1,
            verified: true,
            ..Default::default()
        };
        create(&pool, UserId::new(1), new.clone()).await.unwrap();
        let err = create(&pool, UserId::new(1), new).await.unwrap_err();
        assert_eq!(err.kind(), model::error::Kind::DuplicateSerial);
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_update_rejects_illegal_transition() {
        let pool = PgPool::connect("postgresql://").await.unwrap();
        let created = create(
            &pool,
            UserId::new(1),
            NewProperty {
                serial_number: "SN-2".to_string(),
                name: "Radio".to_string(),
                quantity: 1,
                verified: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let retired = update(
            &pool,
            UserId::new(1),
            created.id,
            PropertyPatch {
                current_status: Some(PropertyStatus::Retired),
                ..Default::default()
            },
            created.version,
        )
        .await
        .unwrap();

        let err = update(
            &pool,
            UserId::new(1),
            created.id,
            PropertyPatch {
                current_status: Some(PropertyStatus::Assigned),
                ..Default::default()
            },
            retired.version,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), model::error::Kind::IllegalTransition);
    }
}
