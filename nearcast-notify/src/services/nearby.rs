use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::geo::{bounding_box, Coordinates};
use crate::models::UserLocation;
use crate::store::LocationStore;

/// Locations older than this are ignored by proximity queries.
pub const LOCATION_STALENESS_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Serialize)]
pub struct NearbyUser {
    pub user_id: Uuid,
    pub distance_m: f64,
    pub last_location: UserLocation,
}

/// Users with a fresh location within `radius_m` of `center`, nearest first.
///
/// Best-effort: a store failure is logged and yields an empty list.
pub async fn find_nearby(
    locations: &dyn LocationStore,
    center: Coordinates,
    radius_m: f64,
    exclude_user_id: Uuid,
) -> Vec<NearbyUser> {
    find_nearby_at(locations, center, radius_m, exclude_user_id, Utc::now()).await
}

pub async fn find_nearby_at(
    locations: &dyn LocationStore,
    center: Coordinates,
    radius_m: f64,
    exclude_user_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<NearbyUser> {
    if !(radius_m.is_finite() && radius_m > 0.0) {
        tracing::warn!(radius_m, "nearby lookup with non-positive radius");
        return Vec::new();
    }

    let cutoff = now - Duration::seconds(LOCATION_STALENESS_SECS);
    let rows = match locations
        .updated_since(cutoff, bounding_box(center, radius_m))
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "nearby location lookup failed");
            return Vec::new();
        }
    };

    let mut nearby: Vec<NearbyUser> = rows
        .into_iter()
        .filter(|loc| loc.user_id != exclude_user_id && loc.updated_at >= cutoff)
        .filter_map(|loc| {
            let distance_m = center.distance_to(&loc.coordinates());
            (distance_m <= radius_m).then_some(NearbyUser {
                user_id: loc.user_id,
                distance_m,
                last_location: loc,
            })
        })
        .collect();

    nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

    tracing::debug!(
        latitude = center.latitude,
        longitude = center.longitude,
        radius_m,
        found = nearby.len(),
        "nearby lookup complete"
    );

    nearby
}
