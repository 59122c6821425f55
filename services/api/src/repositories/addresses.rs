//! Address repository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use common::{
    error::{DatabaseError, DatabaseResult},
    pagination::PageRequest,
};

use crate::{
    geo::{BoundingBox, Coordinates},
    models::address::{Address, AddressRow, NewAddress, Owner},
};

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn create(&self, address: &NewAddress) -> DatabaseResult<Address>;

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Address>>;

    /// Addresses of one owner, or of everyone when `owner` is `None`
    async fn list(
        &self,
        owner: Option<Owner>,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Address>, i64)>;

    /// Persist every mutable field of `address`
    async fn update(&self, address: &Address) -> DatabaseResult<Option<Address>>;

    async fn set_coordinates(
        &self,
        id: Uuid,
        coordinates: Coordinates,
    ) -> DatabaseResult<Option<Address>>;

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;

    /// Addresses with coordinates inside `window`
    async fn within(&self, window: &BoundingBox) -> DatabaseResult<Vec<Address>>;
}

const ADDRESS_COLUMNS: &str = "id, person_id, person_type, street, street2, city, state, zip, \
                               latitude, longitude, created_at, updated_at";

const OWNER_FILTER: &str = r#"
    WHERE ($1::smallint IS NULL OR person_type = $1)
      AND ($1::smallint IS NULL OR person_id IS NOT DISTINCT FROM $2)
"#;

fn into_address(row: AddressRow) -> DatabaseResult<Address> {
    Address::try_from(row).map_err(|e| DatabaseError::from(sqlx::Error::Decode(e.into())))
}

#[derive(Clone)]
pub struct PgAddressRepository {
    pool: PgPool,
}

impl PgAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressRepository for PgAddressRepository {
    async fn create(&self, address: &NewAddress) -> DatabaseResult<Address> {
        info!("Creating address for {:?}", address.owner);

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r#"
            INSERT INTO addresses
                (id, person_id, person_type, street, street2, city, state, zip, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(address.owner.person_id())
        .bind(address.owner.person_type())
        .bind(&address.street)
        .bind(&address.street2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip)
        .bind(address.latitude)
        .bind(address.longitude)
        .fetch_one(&self.pool)
        .await?;

        into_address(row)
    }

    async fn find(&self, id: Uuid) -> DatabaseResult<Option<Address>> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_address).transpose()
    }

    async fn list(
        &self,
        owner: Option<Owner>,
        page: &PageRequest,
    ) -> DatabaseResult<(Vec<Address>, i64)> {
        let person_type = owner.map(|o| o.person_type());
        let person_id = owner.and_then(|o| o.person_id());

        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses {OWNER_FILTER} \
             ORDER BY created_at, id LIMIT $3 OFFSET $4"
        ))
        .bind(person_type)
        .bind(person_id)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM addresses {OWNER_FILTER}"
        ))
        .bind(person_type)
        .bind(person_id)
        .fetch_one(&self.pool)
        .await?;

        let addresses = rows
            .into_iter()
            .map(into_address)
            .collect::<DatabaseResult<Vec<_>>>()?;
        Ok((addresses, total))
    }

    async fn update(&self, address: &Address) -> DatabaseResult<Option<Address>> {
        info!("Updating address {}", address.id);

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r#"
            UPDATE addresses
            SET street = $2, street2 = $3, city = $4, state = $5, zip = $6,
                latitude = $7, longitude = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(address.id)
        .bind(&address.street)
        .bind(&address.street2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip)
        .bind(address.latitude)
        .bind(address.longitude)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_address).transpose()
    }

    async fn set_coordinates(
        &self,
        id: Uuid,
        coordinates: Coordinates,
    ) -> DatabaseResult<Option<Address>> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r#"
            UPDATE addresses
            SET latitude = $2, longitude = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(coordinates.latitude)
        .bind(coordinates.longitude)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_address).transpose()
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting address {}", id);

        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn within(&self, window: &BoundingBox) -> DatabaseResult<Vec<Address>> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r#"
            SELECT {ADDRESS_COLUMNS} FROM addresses
            WHERE latitude BETWEEN $1 AND $2
              AND longitude BETWEEN $3 AND $4
            "#
        ))
        .bind(window.min_latitude)
        .bind(window.max_latitude)
        .bind(window.min_longitude)
        .bind(window.max_longitude)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_address).collect()
    }
}
