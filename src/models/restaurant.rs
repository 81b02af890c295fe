use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// The slice of the catalog's restaurant record that dispatch relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub manager_id: Uuid,
}
