//! PostgreSQL implementation of the storage traits.
//!
//! Conditional updates are single `UPDATE ... WHERE id = $1 AND version = $2`
//! statements run inside the caller's transaction. Unique violations
//! (SQLSTATE 23505) surface as [`VernissageError::Conflict`] carrying the
//! constraint name.

pub mod pool_provider;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

pub use pool_provider::{PoolProvider, TestDbPools};

use super::{
    ApplicationFilter, ApplicationStorage, CompanyStorage, ExhibitionFilter, ExhibitionStorage,
    ParticipantFilter, ParticipantStorage, StatusUpdate, Transactional,
};
use crate::domain::{
    Application, ApplicationKey, ApplicationStatus, Company, CompanyDetails, CompanyId,
    CompanyKind, EntityKind, Exhibition, ExhibitionDetails, ExhibitionId, ExhibitionSchedule,
    ExhibitionStatus, MerchantId, Page, PageRequest, Participant, ParticipantId,
    ParticipantStatus, Profile, ServiceProviderId,
};
use crate::error::{Result, VernissageError};

/// PostgreSQL storage for every workflow entity.
///
/// # Example
/// ```ignore
/// let pool = PgPool::connect("postgresql://localhost/vernissage").await?;
/// vernissage::migrator().run(&pool).await?;
/// let storage = Arc::new(PostgresStorage::new(pool));
/// ```
#[derive(Clone, Debug)]
pub struct PostgresStorage<P: PoolProvider = PgPool> {
    pools: P,
}

impl<P: PoolProvider> PostgresStorage<P> {
    pub fn new(pools: P) -> Self {
        Self { pools }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> VernissageError {
    VernissageError::Other(anyhow!("{}: {}", context, e))
}

/// Like [`db_error`], but a unique violation becomes a structured conflict.
fn write_error(entity: EntityKind, context: &str, e: sqlx::Error) -> VernissageError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.code().as_deref() == Some("23505")
    {
        return VernissageError::Conflict {
            entity,
            constraint: db_err.constraint().unwrap_or("unique").to_string(),
        };
    }
    db_error(context, e)
}

/// `LIKE` pattern matching values that start with `prefix` literally.
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

fn participant_table(entity: EntityKind) -> &'static str {
    match entity {
        EntityKind::ServiceProvider => "service_providers",
        _ => "merchants",
    }
}

fn to_total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

const EXHIBITION_COLUMNS: &str = "id, organizer_id, title, website, industry, tags, country, city, \
    venue, venue_address, description, registration_start, registration_end, start_time, \
    end_time, status, version, created_at, submitted_at, approved_at, updated_at";

const PARTICIPANT_COLUMNS: &str = "id, company_id, name, description, website, \
    contact_person_name, contact_person_phone, contact_person_email, status, version, \
    created_at, submitted_at, approved_at, updated_at";

const COMPANY_COLUMNS: &str = "id, kind, name, country, city, address, email, description, \
    social_credit_code, legal_person_name, legal_person_card_number, version, created_at, \
    updated_at";

const APPLICATION_COLUMNS: &str = "exhibition_id, merchant_id, status, version, created_at, \
    submitted_at, approved_at, updated_at";

#[derive(sqlx::FromRow)]
struct ExhibitionRow {
    id: Uuid,
    organizer_id: Option<Uuid>,
    title: String,
    website: String,
    industry: String,
    tags: Vec<String>,
    country: String,
    city: String,
    venue: String,
    venue_address: String,
    description: String,
    registration_start: DateTime<Utc>,
    registration_end: DateTime<Utc>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: ExhibitionStatus,
    version: i64,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<ExhibitionRow> for Exhibition {
    fn from(row: ExhibitionRow) -> Self {
        Exhibition {
            id: ExhibitionId(row.id),
            organizer_id: row.organizer_id.map(ServiceProviderId),
            details: ExhibitionDetails {
                title: row.title,
                website: row.website,
                industry: row.industry,
                tags: row.tags,
                country: row.country,
                city: row.city,
                venue: row.venue,
                venue_address: row.venue_address,
                description: row.description,
            },
            schedule: ExhibitionSchedule {
                registration_start: row.registration_start,
                registration_end: row.registration_end,
                start_time: row.start_time,
                end_time: row.end_time,
            },
            status: row.status,
            version: row.version,
            created_at: row.created_at,
            submitted_at: row.submitted_at,
            approved_at: row.approved_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    description: String,
    website: String,
    contact_person_name: String,
    contact_person_phone: String,
    contact_person_email: String,
    status: ParticipantStatus,
    version: i64,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl ParticipantRow {
    fn into_participant<I: ParticipantId>(self) -> Participant<I> {
        Participant {
            id: I::from_uuid(self.id),
            company_id: CompanyId(self.company_id),
            profile: Profile {
                name: self.name,
                description: self.description,
                website: self.website,
                contact_person_name: self.contact_person_name,
                contact_person_phone: self.contact_person_phone,
                contact_person_email: self.contact_person_email,
            },
            status: self.status,
            version: self.version,
            created_at: self.created_at,
            submitted_at: self.submitted_at,
            approved_at: self.approved_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    kind: CompanyKind,
    name: String,
    country: String,
    city: String,
    address: String,
    email: String,
    description: String,
    social_credit_code: String,
    legal_person_name: String,
    legal_person_card_number: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: CompanyId(row.id),
            kind: row.kind,
            details: CompanyDetails {
                name: row.name,
                country: row.country,
                city: row.city,
                address: row.address,
                email: row.email,
                description: row.description,
                social_credit_code: row.social_credit_code,
                legal_person_name: row.legal_person_name,
                legal_person_card_number: row.legal_person_card_number,
            },
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    exhibition_id: Uuid,
    merchant_id: Uuid,
    status: ApplicationStatus,
    version: i64,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<ApplicationRow> for Application {
    fn from(row: ApplicationRow) -> Self {
        Application {
            key: ApplicationKey::new(ExhibitionId(row.exhibition_id), MerchantId(row.merchant_id)),
            status: row.status,
            version: row.version,
            created_at: row.created_at,
            submitted_at: row.submitted_at,
            approved_at: row.approved_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl<P: PoolProvider> Transactional for PostgresStorage<P> {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx> {
        self.pools
            .write()
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        tx.rollback()
            .await
            .map_err(|e| db_error("Failed to roll back transaction", e))
    }
}

#[async_trait]
impl<P: PoolProvider> ExhibitionStorage for PostgresStorage<P> {
    #[tracing::instrument(skip(self, tx, exhibition), fields(exhibition_id = %exhibition.id))]
    async fn insert_exhibition(&self, tx: &mut Self::Tx, exhibition: &Exhibition) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO exhibitions ({EXHIBITION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)"
        ))
        .bind(exhibition.id.0)
        .bind(exhibition.organizer_id.map(|id| id.0))
        .bind(&exhibition.details.title)
        .bind(&exhibition.details.website)
        .bind(&exhibition.details.industry)
        .bind(&exhibition.details.tags)
        .bind(&exhibition.details.country)
        .bind(&exhibition.details.city)
        .bind(&exhibition.details.venue)
        .bind(&exhibition.details.venue_address)
        .bind(&exhibition.details.description)
        .bind(exhibition.schedule.registration_start)
        .bind(exhibition.schedule.registration_end)
        .bind(exhibition.schedule.start_time)
        .bind(exhibition.schedule.end_time)
        .bind(exhibition.status)
        .bind(exhibition.version)
        .bind(exhibition.created_at)
        .bind(exhibition.submitted_at)
        .bind(exhibition.approved_at)
        .bind(exhibition.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| write_error(EntityKind::Exhibition, "Failed to insert exhibition", e))?;
        Ok(())
    }

    async fn get_exhibition(&self, id: ExhibitionId) -> Result<Option<Exhibition>> {
        let row = sqlx::query_as::<_, ExhibitionRow>(&format!(
            "SELECT {EXHIBITION_COLUMNS} FROM exhibitions WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to fetch exhibition", e))?;
        Ok(row.map(Exhibition::from))
    }

    async fn list_exhibitions(
        &self,
        filter: &ExhibitionFilter,
        page: PageRequest,
    ) -> Result<Page<Exhibition>> {
        const WHERE: &str = "WHERE ($1::text IS NULL OR title LIKE $1) \
            AND ($2::text IS NULL OR status = $2) \
            AND ($3::uuid IS NULL OR organizer_id = $3)";
        let title = filter.title_prefix.as_deref().map(like_prefix);
        let organizer = filter.organizer_id.map(|id| id.0);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM exhibitions {WHERE}"))
            .bind(&title)
            .bind(filter.status)
            .bind(organizer)
            .fetch_one(self.pools.read())
            .await
            .map_err(|e| db_error("Failed to count exhibitions", e))?;

        let rows = sqlx::query_as::<_, ExhibitionRow>(&format!(
            "SELECT {EXHIBITION_COLUMNS} FROM exhibitions {WHERE} \
             ORDER BY created_at DESC, id LIMIT $4 OFFSET $5"
        ))
        .bind(&title)
        .bind(filter.status)
        .bind(organizer)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to list exhibitions", e))?;

        Ok(Page {
            items: rows.into_iter().map(Exhibition::from).collect(),
            total: to_total(total),
            page: page.page,
        })
    }

    #[tracing::instrument(
        skip(self, tx, update),
        fields(exhibition_id = %update.key, expected_version = update.expected_version)
    )]
    async fn update_exhibition_status(
        &self,
        tx: &mut Self::Tx,
        update: &StatusUpdate<ExhibitionId, ExhibitionStatus>,
    ) -> Result<u64> {
        let (set_submitted, submitted_at) = update.milestones.submitted_at.as_binding();
        let (set_approved, approved_at) = update.milestones.approved_at.as_binding();

        let result = sqlx::query(
            r#"
            UPDATE exhibitions
            SET status = $3,
                version = $2 + 1,
                updated_at = $4,
                submitted_at = CASE WHEN $5 THEN $6 ELSE submitted_at END,
                approved_at = CASE WHEN $7 THEN $8 ELSE approved_at END
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(update.key.0)
        .bind(update.expected_version)
        .bind(update.status)
        .bind(update.updated_at)
        .bind(set_submitted)
        .bind(submitted_at)
        .bind(set_approved)
        .bind(approved_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to update exhibition status", e))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl<P: PoolProvider> CompanyStorage for PostgresStorage<P> {
    async fn insert_company(&self, tx: &mut Self::Tx, company: &Company) -> Result<()> {
        let d = &company.details;
        sqlx::query(&format!(
            "INSERT INTO companies ({COMPANY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(company.id.0)
        .bind(company.kind)
        .bind(&d.name)
        .bind(&d.country)
        .bind(&d.city)
        .bind(&d.address)
        .bind(&d.email)
        .bind(&d.description)
        .bind(&d.social_credit_code)
        .bind(&d.legal_person_name)
        .bind(&d.legal_person_card_number)
        .bind(company.version)
        .bind(company.created_at)
        .bind(company.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| write_error(EntityKind::Company, "Failed to insert company", e))?;
        Ok(())
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to fetch company", e))?;
        Ok(row.map(Company::from))
    }

    async fn update_company_details(
        &self,
        tx: &mut Self::Tx,
        id: CompanyId,
        details: &CompanyDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE companies
            SET name = $2, country = $3, city = $4, address = $5, email = $6,
                description = $7, social_credit_code = $8, legal_person_name = $9,
                legal_person_card_number = $10, version = version + 1, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(&details.name)
        .bind(&details.country)
        .bind(&details.city)
        .bind(&details.address)
        .bind(&details.email)
        .bind(&details.description)
        .bind(&details.social_credit_code)
        .bind(&details.legal_person_name)
        .bind(&details.legal_person_card_number)
        .bind(updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| write_error(EntityKind::Company, "Failed to update company", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl<I, P> ParticipantStorage<I> for PostgresStorage<P>
where
    I: ParticipantId,
    P: PoolProvider,
{
    async fn insert_participant(
        &self,
        tx: &mut Self::Tx,
        participant: &Participant<I>,
    ) -> Result<()> {
        let table = participant_table(I::ENTITY);
        let p = &participant.profile;
        sqlx::query(&format!(
            "INSERT INTO {table} ({PARTICIPANT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(participant.id.as_uuid())
        .bind(participant.company_id.0)
        .bind(&p.name)
        .bind(&p.description)
        .bind(&p.website)
        .bind(&p.contact_person_name)
        .bind(&p.contact_person_phone)
        .bind(&p.contact_person_email)
        .bind(participant.status)
        .bind(participant.version)
        .bind(participant.created_at)
        .bind(participant.submitted_at)
        .bind(participant.approved_at)
        .bind(participant.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| write_error(I::ENTITY, "Failed to insert participant", e))?;
        Ok(())
    }

    async fn get_participant(&self, id: I) -> Result<Option<Participant<I>>> {
        let table = participant_table(I::ENTITY);
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM {table} WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to fetch participant", e))?;
        Ok(row.map(ParticipantRow::into_participant))
    }

    async fn list_participants(
        &self,
        filter: &ParticipantFilter,
        page: PageRequest,
    ) -> Result<Page<Participant<I>>> {
        let table = participant_table(I::ENTITY);
        let where_clause = "WHERE ($1::text IS NULL OR name LIKE $1) \
            AND ($2::text IS NULL OR status = $2)";
        let name = filter.name_prefix.as_deref().map(like_prefix);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} {where_clause}"))
                .bind(&name)
                .bind(filter.status)
                .fetch_one(self.pools.read())
                .await
                .map_err(|e| db_error("Failed to count participants", e))?;

        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM {table} {where_clause} \
             ORDER BY created_at DESC, id LIMIT $3 OFFSET $4"
        ))
        .bind(&name)
        .bind(filter.status)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to list participants", e))?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(ParticipantRow::into_participant)
                .collect(),
            total: to_total(total),
            page: page.page,
        })
    }

    async fn update_participant(
        &self,
        tx: &mut Self::Tx,
        update: &StatusUpdate<I, ParticipantStatus>,
        profile: Option<&Profile>,
    ) -> Result<u64> {
        let table = participant_table(I::ENTITY);
        let (set_submitted, submitted_at) = update.milestones.submitted_at.as_binding();
        let (set_approved, approved_at) = update.milestones.approved_at.as_binding();

        let result = sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET status = $3,
                version = $2 + 1,
                updated_at = $4,
                submitted_at = CASE WHEN $5 THEN $6 ELSE submitted_at END,
                approved_at = CASE WHEN $7 THEN $8 ELSE approved_at END,
                name = COALESCE($9, name),
                description = COALESCE($10, description),
                website = COALESCE($11, website),
                contact_person_name = COALESCE($12, contact_person_name),
                contact_person_phone = COALESCE($13, contact_person_phone),
                contact_person_email = COALESCE($14, contact_person_email)
            WHERE id = $1 AND version = $2
            "#
        ))
        .bind(update.key.as_uuid())
        .bind(update.expected_version)
        .bind(update.status)
        .bind(update.updated_at)
        .bind(set_submitted)
        .bind(submitted_at)
        .bind(set_approved)
        .bind(approved_at)
        .bind(profile.map(|p| p.name.as_str()))
        .bind(profile.map(|p| p.description.as_str()))
        .bind(profile.map(|p| p.website.as_str()))
        .bind(profile.map(|p| p.contact_person_name.as_str()))
        .bind(profile.map(|p| p.contact_person_phone.as_str()))
        .bind(profile.map(|p| p.contact_person_email.as_str()))
        .execute(&mut **tx)
        .await
        .map_err(|e| write_error(I::ENTITY, "Failed to update participant", e))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl<P: PoolProvider> ApplicationStorage for PostgresStorage<P> {
    async fn insert_application(
        &self,
        tx: &mut Self::Tx,
        application: &Application,
    ) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO exhibition_merchants ({APPLICATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(application.key.exhibition_id.0)
        .bind(application.key.merchant_id.0)
        .bind(application.status)
        .bind(application.version)
        .bind(application.created_at)
        .bind(application.submitted_at)
        .bind(application.approved_at)
        .bind(application.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| write_error(EntityKind::Application, "Failed to insert application", e))?;
        Ok(())
    }

    async fn get_application(&self, key: ApplicationKey) -> Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM exhibition_merchants \
             WHERE exhibition_id = $1 AND merchant_id = $2"
        ))
        .bind(key.exhibition_id.0)
        .bind(key.merchant_id.0)
        .fetch_optional(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to fetch application", e))?;
        Ok(row.map(Application::from))
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Page<Application>> {
        const WHERE: &str = "WHERE ($1::uuid IS NULL OR exhibition_id = $1) \
            AND ($2::uuid IS NULL OR merchant_id = $2) \
            AND ($3::text IS NULL OR status = $3)";
        let exhibition_id = filter.exhibition_id.map(|id| id.0);
        let merchant_id = filter.merchant_id.map(|id| id.0);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM exhibition_merchants {WHERE}"
        ))
        .bind(exhibition_id)
        .bind(merchant_id)
        .bind(filter.status)
        .fetch_one(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to count applications", e))?;

        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM exhibition_merchants {WHERE} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(exhibition_id)
        .bind(merchant_id)
        .bind(filter.status)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pools.read())
        .await
        .map_err(|e| db_error("Failed to list applications", e))?;

        Ok(Page {
            items: rows.into_iter().map(Application::from).collect(),
            total: to_total(total),
            page: page.page,
        })
    }

    async fn update_application(
        &self,
        tx: &mut Self::Tx,
        update: &StatusUpdate<ApplicationKey, ApplicationStatus>,
    ) -> Result<u64> {
        let (set_submitted, submitted_at) = update.milestones.submitted_at.as_binding();
        let (set_approved, approved_at) = update.milestones.approved_at.as_binding();

        let result = sqlx::query(
            r#"
            UPDATE exhibition_merchants
            SET status = $4,
                version = $3 + 1,
                updated_at = $5,
                submitted_at = CASE WHEN $6 THEN $7 ELSE submitted_at END,
                approved_at = CASE WHEN $8 THEN $9 ELSE approved_at END
            WHERE exhibition_id = $1 AND merchant_id = $2 AND version = $3
            "#,
        )
        .bind(update.key.exhibition_id.0)
        .bind(update.key.merchant_id.0)
        .bind(update.expected_version)
        .bind(update.status)
        .bind(update.updated_at)
        .bind(set_submitted)
        .bind(submitted_at)
        .bind(set_approved)
        .bind(approved_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to update application status", e))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix("plain"), "plain%");
    }

    #[test]
    fn participant_tables_follow_role() {
        assert_eq!(participant_table(EntityKind::Merchant), "merchants");
        assert_eq!(
            participant_table(EntityKind::ServiceProvider),
            "service_providers"
        );
    }
}
