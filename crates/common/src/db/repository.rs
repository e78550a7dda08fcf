//! Repository pattern for database operations
//!
//! Sole owner of the papers table. Every operation is a single unit of work;
//! update and delete check existence and mutate inside one transaction so no
//! caller can observe a half-applied change.

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    NotSet, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info};

use crate::db::filter::contains_pattern;
use crate::db::models::*;
use crate::db::{DbPool, PaperFilter};
use crate::errors::{AppError, Result};
use crate::metrics::StoreTimer;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Paper Operations
    // ========================================================================

    /// Insert a paper; the store assigns `id`, `created_at` and `updated_at`
    pub async fn create_paper(&self, paper: NewPaper) -> Result<Paper> {
        StoreTimer::start("create")
            .observe(self.insert_paper(paper).await)
    }

    /// Find paper by ID
    pub async fn find_paper_by_id(&self, id: i64) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Get paper by ID, `NotFound` if there is no such row
    pub async fn get_paper(&self, id: i64) -> Result<Paper> {
        let result = self
            .find_paper_by_id(id)
            .await
            .and_then(|found| found.ok_or(AppError::NotFound { id }));

        StoreTimer::start("get").observe(result)
    }

    /// List papers matching the filter in ascending id order
    pub async fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        StoreTimer::start("list").observe(self.select_papers(filter).await)
    }

    /// Overwrite the mutable fields of an existing paper and refresh `updated_at`
    pub async fn update_paper(&self, id: i64, paper: NewPaper) -> Result<Paper> {
        StoreTimer::start("update")
            .observe(self.overwrite_paper(id, paper).await)
    }

    /// Permanently delete a paper
    pub async fn delete_paper(&self, id: i64) -> Result<()> {
        StoreTimer::start("delete").observe(self.remove_paper(id).await)
    }

    async fn insert_paper(&self, paper: NewPaper) -> Result<Paper> {
        let now = now();

        let active = PaperActiveModel {
            id: NotSet,
            title: Set(paper.title),
            authors: Set(paper.authors),
            published_in: Set(paper.published_in),
            year: Set(paper.year),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = active.insert(self.conn()).await?;
        info!(paper_id = created.id, year = created.year, "Paper created");

        Ok(created)
    }

    async fn select_papers(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        let mut query = PaperEntity::find();

        if let Some(year) = filter.year() {
            query = query.filter(PaperColumn::Year.eq(year));
        }

        if let Some(venue) = filter.published_in() {
            let lowered = Expr::expr(Func::lower(Expr::col((PaperEntity, PaperColumn::PublishedIn))));
            query = query.filter(lowered.like(LikeExpr::new(contains_pattern(venue)).escape('\\')));
        }

        let papers = query
            .order_by_asc(PaperColumn::Id)
            .limit(filter.limit())
            .offset(filter.offset())
            .all(self.conn())
            .await?;

        debug!(
            count = papers.len(),
            limit = filter.limit(),
            offset = filter.offset(),
            "Papers listed"
        );

        Ok(papers)
    }

    async fn overwrite_paper(&self, id: i64, paper: NewPaper) -> Result<Paper> {
        let txn = self.conn().begin().await?;

        let existing = claim_paper(&txn, id).await?;

        // never earlier than the stored stamp, even if the clock stepped back
        let updated_at = now().max(existing.updated_at);

        let mut active: PaperActiveModel = existing.into();
        active.title = Set(paper.title);
        active.authors = Set(paper.authors);
        active.published_in = Set(paper.published_in);
        active.year = Set(paper.year);
        active.updated_at = Set(updated_at);

        let updated = active.update(&txn).await.map_err(|e| match e {
            DbErr::RecordNotUpdated => AppError::NotFound { id },
            other => other.into(),
        })?;

        txn.commit().await?;
        info!(paper_id = id, "Paper updated");

        Ok(updated)
    }

    async fn remove_paper(&self, id: i64) -> Result<()> {
        let txn = self.conn().begin().await?;

        claim_paper(&txn, id).await?;

        PaperEntity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        info!(paper_id = id, "Paper deleted");

        Ok(())
    }
}

/// Take the write lock on row `id` and read it back.
///
/// The first statement of the transaction is a no-op write: SQLite takes its
/// database write lock here, waiting out the busy timeout instead of failing a
/// later read-to-write upgrade, and PostgreSQL locks the row.
async fn claim_paper(txn: &DatabaseTransaction, id: i64) -> Result<Paper> {
    let claimed = PaperEntity::update_many()
        .col_expr(PaperColumn::Id, Expr::col(PaperColumn::Id).into())
        .filter(PaperColumn::Id.eq(id))
        .exec(txn)
        .await?;

    if claimed.rows_affected == 0 {
        return Err(AppError::NotFound { id });
    }

    PaperEntity::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(AppError::NotFound { id })
}

/// Current UTC time at the precision every backend can store
fn now() -> DateTime<FixedOffset> {
    Utc::now().trunc_subsecs(6).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::errors::ErrorCode;
    use sea_orm::ConnectionTrait;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    async fn repo() -> Repository {
        let pool = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();
        Repository::new(pool)
    }

    fn paper(title: &str, venue: &str, year: i32) -> NewPaper {
        NewPaper {
            title: title.to_string(),
            authors: "John Doe, Jane Smith".to_string(),
            published_in: venue.to_string(),
            year,
        }
    }

    async fn seed(repo: &Repository, count: usize) -> Vec<Paper> {
        let mut created = Vec::new();
        for i in 0..count {
            let title = format!("Paper {}", i);
            created.push(repo.create_paper(paper(&title, "ICSE 2024", 2024)).await.unwrap());
        }
        created
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let repo = repo().await;

        let created = assert_ok!(repo.create_paper(paper("A", "ICSE 2024", 2024)).await);
        assert_eq!(created.id, 1);
        assert_eq!(created.title, "A");
        assert_eq!(created.year, 2024);
        assert_eq!(created.created_at, created.updated_at);

        let second = assert_ok!(repo.create_paper(paper("B", "FSE 2023", 2023)).await);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let repo = repo().await;
        let created = repo.create_paper(paper("Round Trip", "ICSE 2024", 2024)).await.unwrap();

        let fetched = assert_ok!(repo.get_paper(created.id).await);
        assert_eq!(fetched, created);

        // repeated reads of an unmodified record are identical
        assert_eq!(repo.get_paper(created.id).await.unwrap(), fetched);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = repo().await;
        let err = assert_err!(repo.get_paper(99999).await);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(repo.find_paper_by_id(99999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_enforces_year_constraint() {
        let repo = repo().await;

        let err = assert_err!(repo.create_paper(paper("Old", "Venue", 1900)).await);
        assert_eq!(err.code(), ErrorCode::ConstraintViolation);

        let created = repo.create_paper(paper("New", "Venue", 2000)).await.unwrap();
        let err = assert_err!(repo.update_paper(created.id, paper("New", "Venue", 1850)).await);
        assert_eq!(err.code(), ErrorCode::ConstraintViolation);

        // the rejected update left the row untouched
        assert_eq!(repo.get_paper(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_update_keeps_identity_and_creation_time() {
        let repo = repo().await;
        let created = repo.create_paper(paper("Original", "ICSE 2024", 2024)).await.unwrap();

        let mut previous = created.clone();
        for year in [2025, 2026, 2027] {
            let changed = NewPaper {
                title: format!("Title {}", year),
                authors: "Updated Author".to_string(),
                published_in: "Updated Venue".to_string(),
                year,
            };
            let updated = assert_ok!(repo.update_paper(created.id, changed).await);

            assert_eq!(updated.id, created.id);
            assert_eq!(updated.created_at, created.created_at);
            assert_eq!(updated.title, format!("Title {}", year));
            assert_eq!(updated.authors, "Updated Author");
            assert_eq!(updated.published_in, "Updated Venue");
            assert_eq!(updated.year, year);
            assert!(updated.updated_at >= previous.updated_at);
            assert!(updated.created_at <= updated.updated_at);

            assert_eq!(repo.get_paper(created.id).await.unwrap(), updated);
            previous = updated;
        }
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = repo().await;
        let err = assert_err!(repo.update_paper(42, paper("X", "Y", 2020)).await);
        assert_eq!(err.code(), ErrorCode::NotFound);

        // nothing was created as a side effect
        assert!(repo.list_papers(&PaperFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_terminal() {
        let repo = repo().await;
        let created = repo.create_paper(paper("Doomed", "ICSE 2024", 2024)).await.unwrap();

        assert_ok!(repo.delete_paper(created.id).await);

        let err = assert_err!(repo.get_paper(created.id).await);
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err = assert_err!(repo.update_paper(created.id, paper("Back", "V", 2020)).await);
        assert_eq!(err.code(), ErrorCode::NotFound);
        let err = assert_err!(repo.delete_paper(created.id).await);
        assert_eq!(err.code(), ErrorCode::NotFound);

        // ids are never handed out again
        let next = repo.create_paper(paper("Next", "ICSE 2024", 2024)).await.unwrap();
        assert!(next.id > created.id);
    }

    #[tokio::test]
    async fn test_pagination_pages_are_disjoint_and_ordered() {
        let repo = repo().await;
        seed(&repo, 5).await;

        let page = |limit, offset| PaperFilter::new().with_page(limit, offset).unwrap();

        let first = repo.list_papers(&page(2, 0)).await.unwrap();
        let second = repo.list_papers(&page(2, 2)).await.unwrap();
        let four = repo.list_papers(&page(4, 0)).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert!(first.iter().all(|p| !second.contains(p)));

        let joined: Vec<Paper> = first.into_iter().chain(second).collect();
        assert_eq!(joined, four);
        assert!(four.windows(2).all(|w| w[0].id < w[1].id));

        let tail = repo.list_papers(&page(10, 4)).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert!(repo.list_papers(&page(10, 5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_page_is_ten() {
        let repo = repo().await;
        seed(&repo, 12).await;

        let papers = repo.list_papers(&PaperFilter::new()).await.unwrap();
        assert_eq!(papers.len(), 10);
        assert_eq!(papers[0].id, 1);
    }

    #[tokio::test]
    async fn test_venue_filter_is_case_insensitive_substring() {
        let repo = repo().await;
        let icse = repo.create_paper(paper("A", "ICSE 2023", 2023)).await.unwrap();
        repo.create_paper(paper("B", "FSE 2023", 2023)).await.unwrap();

        for needle in ["icse", "ICSE", "IcSe", "cse 20"] {
            let filter = PaperFilter::new().with_published_in(needle);
            let found = repo.list_papers(&filter).await.unwrap();
            assert_eq!(found, vec![icse.clone()], "needle {}", needle);
        }

        let filter = PaperFilter::new().with_published_in("2023");
        assert_eq!(repo.list_papers(&filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_venue_filter_treats_wildcards_literally() {
        let repo = repo().await;
        let literal = repo.create_paper(paper("A", "100% Conf", 2020)).await.unwrap();
        repo.create_paper(paper("B", "1000 Conf", 2020)).await.unwrap();

        let filter = PaperFilter::new().with_published_in("100%");
        assert_eq!(repo.list_papers(&filter).await.unwrap(), vec![literal]);

        let filter = PaperFilter::new().with_published_in("_");
        assert!(repo.list_papers(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_combine_with_and() {
        let repo = repo().await;
        let target = repo.create_paper(paper("A", "ICSE 2024", 2024)).await.unwrap();
        repo.create_paper(paper("B", "ICSE 2023", 2023)).await.unwrap();
        repo.create_paper(paper("C", "FSE 2024", 2024)).await.unwrap();

        let filter = PaperFilter::new().with_year(2024).with_published_in("icse");
        assert_eq!(repo.list_papers(&filter).await.unwrap(), vec![target]);

        let filter = PaperFilter::new().with_year(1999);
        assert!(repo.list_papers(&filter).await.unwrap().is_empty());
    }

    /// Repository over a database file with the default pool size
    async fn file_repo(dir: &TempDir) -> Repository {
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", dir.path().join("papers.db").display()),
            ..DatabaseConfig::default()
        };
        Repository::new(DbPool::new(&config).await.unwrap())
    }

    fn writer(i: i32) -> NewPaper {
        NewPaper {
            title: format!("Writer {}", i),
            authors: format!("Author {}", i),
            published_in: format!("Venue {}", i),
            year: 2000 + i,
        }
    }

    /// Every field of a stored row comes from the same write
    fn assert_consistent(stored: &Paper, created: &Paper) {
        assert_eq!(stored.id, created.id);
        assert_eq!(stored.created_at, created.created_at);
        assert!(stored.created_at <= stored.updated_at);

        if stored.title == created.title {
            assert_eq!(stored, created);
            return;
        }

        let i: i32 = stored.title.trim_start_matches("Writer ").parse().unwrap();
        let expected = writer(i);
        assert_eq!(stored.authors, expected.authors);
        assert_eq!(stored.published_in, expected.published_in);
        assert_eq!(stored.year, expected.year);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let repo = file_repo(&dir).await;
        let created = repo.create_paper(paper("Start", "V", 2020)).await.unwrap();
        let id = created.id;

        let mut handles = Vec::new();
        for i in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.update_paper(id, writer(i)).await }));
        }

        for handle in handles {
            let updated = assert_ok!(handle.await.unwrap());
            assert_consistent(&updated, &created);
        }

        let last = repo.get_paper(id).await.unwrap();
        assert_consistent(&last, &created);
        assert_ne!(last.title, created.title);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_update_delete_and_read_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let repo = file_repo(&dir).await;
        let created = repo.create_paper(paper("Start", "V", 2020)).await.unwrap();
        let id = created.id;

        let mut updates = Vec::new();
        let mut deletes = Vec::new();
        let mut reads = Vec::new();
        for i in 0..24 {
            let updater = repo.clone();
            updates.push(tokio::spawn(async move { updater.update_paper(id, writer(i)).await }));

            if i % 6 == 0 {
                let deleter = repo.clone();
                deletes.push(tokio::spawn(async move { deleter.delete_paper(id).await }));
            }

            let reader = repo.clone();
            reads.push(tokio::spawn(async move { reader.get_paper(id).await }));
        }

        for handle in updates {
            match handle.await.unwrap() {
                Ok(updated) => assert_consistent(&updated, &created),
                Err(err) => assert_eq!(err.code(), ErrorCode::NotFound, "{}", err),
            }
        }

        let mut deleted = 0;
        for handle in deletes {
            match handle.await.unwrap() {
                Ok(()) => deleted += 1,
                Err(err) => assert_eq!(err.code(), ErrorCode::NotFound, "{}", err),
            }
        }
        assert_eq!(deleted, 1);

        for handle in reads {
            match handle.await.unwrap() {
                Ok(stored) => assert_consistent(&stored, &created),
                Err(err) => assert_eq!(err.code(), ErrorCode::NotFound, "{}", err),
            }
        }

        let err = assert_err!(repo.get_paper(id).await);
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_backend_failure_is_unavailable() {
        let repo = repo().await;
        repo.conn()
            .execute_unprepared("DROP TABLE papers")
            .await
            .unwrap();

        let err = assert_err!(repo.get_paper(1).await);
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        let err = assert_err!(repo.list_papers(&PaperFilter::new()).await);
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
    }
}
