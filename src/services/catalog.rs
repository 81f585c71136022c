use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entities::product_variant::{self, Entity as ProductVariant},
    errors::ServiceError,
};

/// Resolves a variant scoped to a store, rejecting cross-store references.
/// The catalog itself is owned by an external collaborator; the core only
/// reads variant identity and price.
pub async fn find_store_variant<C: ConnectionTrait>(
    db: &C,
    store_id: Uuid,
    variant_id: Uuid,
) -> Result<product_variant::Model, ServiceError> {
    ProductVariant::find_by_id(variant_id)
        .filter(product_variant::Column::StoreId.eq(store_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Variant {} not found in store {}",
                variant_id, store_id
            ))
        })
}
