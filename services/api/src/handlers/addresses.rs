//! `/addresses` handlers, including distance and nearby search

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use common::{
    access::{CurrentUser, Role},
    pagination::{Page, PageRequest},
    response::{ApiError, ApiResponse, ApiResult, JsonBody, PathParams, QueryParams, WithRejection},
};

use crate::{
    geo::{BoundingBox, Coordinates, distance_between},
    models::address::{
        Address, AddressQuery, Distance, NearbyAddress, NearbyQuery, NewAddress, Owner,
        UpdateAddress,
    },
    state::AppState,
};

/// Users edit their own addresses; everything else needs a manager
fn can_write(user: &CurrentUser, owner: &Owner) -> bool {
    match owner {
        Owner::User(id) if user.is_self(*id) => true,
        _ => user.has_role(Role::Manager),
    }
}

async fn can_read(state: &AppState, user: &CurrentUser, owner: &Owner) -> ApiResult<bool> {
    if can_write(user, owner) {
        return Ok(true);
    }

    match owner {
        Owner::System => Ok(true),
        Owner::Patient(patient_id) => Ok(state.assignments.is_assigned(user.id, *patient_id).await?),
        Owner::User(_) => Ok(false),
    }
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<Address> {
    state
        .addresses
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Address"))
}

async fn load_readable(state: &AppState, user: &CurrentUser, id: Uuid) -> ApiResult<Address> {
    let address = load(state, id).await?;
    if !can_read(state, user, &address.owner).await? {
        return Err(ApiError::forbidden());
    }
    Ok(address)
}

pub async fn create_address(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Json(payload), _): JsonBody<NewAddress>,
) -> ApiResult<impl IntoResponse> {
    if !can_write(&user, &payload.owner) {
        return Err(ApiError::forbidden());
    }
    payload.validate().map_err(ApiError::BadRequest)?;

    let mut address = state.addresses.create(&payload).await?;
    info!("{} created address {}", user.username, address.id);

    // Best effort: a geocoder outage must not fail the create
    if address.coordinates().is_none() {
        if let Some(geocoder) = &state.geocoder {
            match geocoder.locate(&address).await {
                Ok(Some(coordinates)) => {
                    if let Some(located) =
                        state.addresses.set_coordinates(address.id, coordinates).await?
                    {
                        address = located;
                    }
                }
                Ok(None) => info!("No geocoder match for address {}", address.id),
                Err(e) => warn!("Geocoding address {} failed: {:#}", address.id, e),
            }
        }
    }

    Ok(ApiResponse::created(address))
}

pub async fn list_addresses(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(page), _): QueryParams<PageRequest>,
    WithRejection(Query(query), _): QueryParams<AddressQuery>,
) -> ApiResult<impl IntoResponse> {
    let owner = query.owner().map_err(ApiError::BadRequest)?;

    let owner = match owner {
        Some(owner) => {
            if !can_read(&state, &user, &owner).await? {
                return Err(ApiError::forbidden());
            }
            Some(owner)
        }
        None if user.has_role(Role::Manager) => None,
        // Caregivers without a filter get their own addresses
        None => Some(Owner::User(user.id)),
    };

    let (addresses, total) = state.addresses.list(owner, &page).await?;
    Ok(ApiResponse::ok(Page::new(addresses, &page, total)))
}

pub async fn get_address(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ApiResponse::ok(load_readable(&state, &user, id).await?))
}

pub async fn update_address(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(payload), _): JsonBody<UpdateAddress>,
) -> ApiResult<impl IntoResponse> {
    let current = load(&state, id).await?;
    if !can_write(&user, &current.owner) {
        return Err(ApiError::forbidden());
    }

    let merged = current.merged(&payload);
    merged.validate().map_err(ApiError::BadRequest)?;

    let address = state
        .addresses
        .update(&merged)
        .await?
        .ok_or_else(|| ApiError::not_found("Address"))?;

    info!("{} updated address {}", user.username, id);
    Ok(ApiResponse::ok(address))
}

pub async fn delete_address(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let current = load(&state, id).await?;
    if !can_write(&user, &current.owner) {
        return Err(ApiError::forbidden());
    }

    if !state.addresses.delete(id).await? {
        return Err(ApiError::not_found("Address"));
    }

    info!("{} deleted address {}", user.username, id);
    Ok(ApiResponse::message("Address deleted"))
}

pub async fn address_distance(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path((id, other_id)), _): PathParams<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let from = load_readable(&state, &user, id).await?;
    let to = load_readable(&state, &user, other_id).await?;

    Ok(ApiResponse::ok(Distance {
        miles: distance_between(from.coordinates(), to.coordinates()),
    }))
}

pub async fn nearby_addresses(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Query(query), _): QueryParams<NearbyQuery>,
) -> ApiResult<impl IntoResponse> {
    let center =
        Coordinates::new(query.lat, query.lon).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let window = if query.exact {
        BoundingBox::covering(center, query.radius)
    } else {
        BoundingBox::around(center, query.radius)
    }
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut results = Vec::new();
    for address in state.addresses.within(&window).await? {
        if !can_read(&state, &user, &address.owner).await? {
            continue;
        }

        let distance_miles = address.coordinates().map(|point| center.distance_to(&point));
        if query.exact && distance_miles.is_none_or(|miles| miles > query.radius) {
            continue;
        }

        results.push(NearbyAddress {
            address,
            distance_miles,
        });
    }

    results.sort_by(|a, b| {
        a.distance_miles
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.distance_miles.unwrap_or(f64::INFINITY))
    });

    Ok(ApiResponse::ok(results))
}

pub async fn geocode_address(
    State(state): State<AppState>,
    user: CurrentUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let address = load(&state, id).await?;
    if !can_write(&user, &address.owner) {
        return Err(ApiError::forbidden());
    }

    let geocoder = state
        .geocoder
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Geocoding is not configured".to_string()))?;

    let coordinates = geocoder
        .locate(&address)
        .await
        .map_err(|e| {
            warn!("Geocoding address {} failed: {:#}", id, e);
            ApiError::ServiceUnavailable("Geocoder is unavailable".to_string())
        })?
        .ok_or_else(|| ApiError::NotFound("No location found for this address".to_string()))?;

    let address = state
        .addresses
        .set_coordinates(id, coordinates)
        .await?
        .ok_or_else(|| ApiError::not_found("Address"))?;

    info!("{} geocoded address {}", user.username, id);
    Ok(ApiResponse::ok(address))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "someone@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn write_access_by_owner() {
        let caregiver = user(Role::Caregiver);
        let manager = user(Role::Manager);

        assert!(can_write(&caregiver, &Owner::User(caregiver.id)));
        assert!(!can_write(&caregiver, &Owner::User(manager.id)));
        assert!(!can_write(&caregiver, &Owner::System));
        assert!(!can_write(&caregiver, &Owner::Patient(Uuid::new_v4())));

        assert!(can_write(&manager, &Owner::User(caregiver.id)));
        assert!(can_write(&manager, &Owner::System));
        assert!(can_write(&manager, &Owner::Patient(Uuid::new_v4())));
    }
}
