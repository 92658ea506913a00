use {
    model::{
        ids::{PropertyComponentId, PropertyId, UserId},
        PropertyComponent,
    },
    sqlx::PgConnection,
};

pub async fn attach(
    ex: &mut PgConnection,
    parent_id: PropertyId,
    child_id: PropertyId,
    attached_by: UserId,
    position: Option<&str>,
    attachment_type: Option<&str>,
) -> sqlx::Result<PropertyComponent> {
    sqlx::query_as::<_, PropertyComponent>(
        "INSERT INTO property_components (parent_id, child_id, attached_by_user_id, position, attachment_type)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(parent_id)
    .bind(child_id)
    .bind(attached_by)
    .bind(position)
    .bind(attachment_type)
    .fetch_one(ex)
    .await
}

pub async fn detach(ex: &mut PgConnection, child_id: PropertyId) -> sqlx::Result<Option<PropertyComponent>> {
    sqlx::query_as::<_, PropertyComponent>(
        "DELETE FROM property_components WHERE child_id = $1 RETURNING *",
    )
    .bind(child_id)
    .fetch_optional(ex)
    .await
}

pub async fn detach_by_id(
    ex: &mut PgConnection,
    edge_id: PropertyComponentId,
) -> sqlx::Result<Option<PropertyComponent>> {
    sqlx::query_as::<_, PropertyComponent>(
        "DELETE FROM property_components WHERE id = $1 RETURNING *",
    )
    .bind(edge_id)
    .fetch_optional(ex)
    .await
}

pub async fn get_by_child(
    ex: &mut PgConnection,
    child_id: PropertyId,
) -> sqlx::Result<Option<PropertyComponent>> {
    sqlx::query_as::<_, PropertyComponent>("SELECT * FROM property_components WHERE child_id = $1")
        .bind(child_id)
        .fetch_optional(ex)
        .await
}

pub async fn children_of(
    ex: &mut PgConnection,
    parent_id: PropertyId,
) -> sqlx::Result<Vec<PropertyComponent>> {
    sqlx::query_as::<_, PropertyComponent>("SELECT * FROM property_components WHERE parent_id = $1")
        .bind(parent_id)
        .fetch_all(ex)
        .await
}

/// Walks descendants of `root` breadth-first. Used both to enforce (I7)
/// acyclicity at attach time (walk `child`'s ancestors up through `root`
/// and reject if `root` appears) and to co-move every descendant on
/// transfer-accept (spec.md §4.2).
pub async fn descendants(
    ex: &mut PgConnection,
    root: PropertyId,
) -> sqlx::Result<Vec<PropertyComponent>> {
    let mut out = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        let edges = children_of(ex, parent).await?;
        for edge in edges {
            frontier.push(edge.child_id);
            out.push(edge);
        }
    }
    Ok(out)
}

/// Walks up from `start` via `child_id -> parent_id` edges, returning every
/// ancestor. Used to reject a cyclic attach (I7): if `candidate_parent`
/// shows up among `child`'s ancestors, attaching would create a cycle.
pub async fn ancestors(ex: &mut PgConnection, start: PropertyId) -> sqlx::Result<Vec<PropertyId>> {
    let mut out = Vec::new();
    let mut current = start;
    while let Some(edge) = get_by_child(ex, current).await? {
        out.push(edge.parent_id);
        current = edge.parent_id;
    }
    Ok(out)
}
