use crate::gamification::XP_PER_LEVEL;
use crate::impl_paginatable_for;
use crate::model::repo::ResourceTyped;
use crate::web::AuthenticatedUser;
use crate::web::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserEntity {
    id: uuid::Uuid,
    username: String,
    email: String,
    #[serde(skip)]
    password_hash: String,
    role: String,
    level: i64,
    xp: i64,
    streak_count: i64,
    last_activity_date: Option<DateTime<Utc>>,
    country: Option<String>,
    view_global_always: bool,
    is_verified: bool,
    #[serde(skip)]
    otp_code: Option<String>,
    #[serde(skip)]
    otp_expires: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UserEntityCreateUpdate {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeaderboardRow {
    pub id: Uuid,
    pub username: String,
    pub level: i64,
    pub xp: i64,
    pub streak_count: i64,
}

impl ResourceTyped for UserEntity {
    fn get_resource_type() -> crate::model::repo::ResourceType {
        crate::model::repo::ResourceType::User
    }
}

impl UserEntity {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.as_str())
    }

    pub fn level(&self) -> i64 {
        self.level
    }

    pub fn xp(&self) -> i64 {
        self.xp
    }

    pub fn streak_count(&self) -> i64 {
        self.streak_count
    }

    pub fn last_activity_date(&self) -> Option<DateTime<Utc>> {
        self.last_activity_date
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn view_global_always(&self) -> bool {
        self.view_global_always
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when `code` matches the stored OTP and it has not expired at `now`.
    pub fn otp_matches(&self, code: &str, now: DateTime<Utc>) -> bool {
        match (&self.otp_code, self.otp_expires) {
            (Some(stored), Some(expires)) => stored == code.trim() && expires > now,
            _ => false,
        }
    }
}

#[async_trait::async_trait]
impl CrudRepository<UserEntity, UserEntityCreateUpdate, uuid::Uuid> for UserEntity {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, is_verified, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7)",
        )
        .bind(id)
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.role)
        .bind(data.is_verified)
        .bind(created_at)
        .execute(mm.executor())
        .await?;

        Ok(UserEntity {
            id,
            username: data.username,
            email: data.email,
            password_hash: data.password_hash,
            role: data.role,
            level: 1,
            xp: 0,
            streak_count: 0,
            last_activity_date: None,
            country: None,
            view_global_always: false,
            is_verified: data.is_verified,
            otp_code: None,
            otp_expires: None,
            created_at,
        })
    }

    /// Updates username and email only; password and role have their own setters.
    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: UserEntityCreateUpdate,
    ) -> DatabaseResult<Self> {
        sqlx::query("UPDATE users SET username = $1, email = $2 WHERE id = $3")
            .bind(&data.username)
            .bind(&data.email)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.username = data.username;
        self.email = data.email;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: uuid::Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC, rowid DESC LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(UserEntity, UserEntityCreateUpdate, Uuid);

impl UserEntity {
    pub async fn find_by_username(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        username: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn find_by_email(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        email: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Login identity is either the username or the email.
    pub async fn find_by_identity(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        identity: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM users WHERE username = $1 OR email = $1 LIMIT 1")
            .bind(identity)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Any user other than `exclude` already holding the username or the email.
    pub async fn find_conflict(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        username: &str,
        email: &str,
        exclude: Option<Uuid>,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM users WHERE (username = $1 OR email = $2) AND ($3 IS NULL OR id != $3) LIMIT 1",
        )
        .bind(username)
        .bind(email)
        .bind(exclude)
        .fetch_optional(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn set_otp(
        &mut self,
        mm: &ModelManager,
        code: &str,
        expires: DateTime<Utc>,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET otp_code = $1, otp_expires = $2 WHERE id = $3")
            .bind(code)
            .bind(expires)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.otp_code = Some(code.to_string());
        self.otp_expires = Some(expires);
        Ok(())
    }

    /// Marks the account verified and clears the pending OTP.
    pub async fn mark_verified(&mut self, mm: &ModelManager) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE users SET is_verified = TRUE, otp_code = NULL, otp_expires = NULL WHERE id = $1",
        )
        .bind(self.id)
        .execute(mm.executor())
        .await?;

        self.is_verified = true;
        self.otp_code = None;
        self.otp_expires = None;
        Ok(())
    }

    pub async fn set_country(&mut self, mm: &ModelManager, country: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET country = $1 WHERE id = $2")
            .bind(country)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.country = Some(country.to_string());
        Ok(())
    }

    pub async fn toggle_global(&mut self, mm: &ModelManager) -> DatabaseResult<bool> {
        let flipped = !self.view_global_always;
        sqlx::query("UPDATE users SET view_global_always = $1 WHERE id = $2")
            .bind(flipped)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.view_global_always = flipped;
        Ok(flipped)
    }

    pub async fn set_profile(
        &mut self,
        mm: &ModelManager,
        username: &str,
        email: &str,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET username = $1, email = $2 WHERE id = $3")
            .bind(username)
            .bind(email)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.username = username.to_string();
        self.email = email.to_string();
        Ok(())
    }

    pub async fn set_password_hash(&mut self, mm: &ModelManager, hash: String) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(&hash)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.password_hash = hash;
        Ok(())
    }

    pub async fn set_role(&mut self, mm: &ModelManager, role: UserRole) -> DatabaseResult<()> {
        let role = role.to_string();
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(&role)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.role = role;
        Ok(())
    }

    /// Adds `xp_gain` and moves the streak in a single statement, so concurrent
    /// completions for the same user never overwrite each other's XP.
    pub async fn record_activity(
        &mut self,
        mm: &ModelManager,
        xp_gain: i64,
        streak_count: i64,
        at: DateTime<Utc>,
    ) -> DatabaseResult<()> {
        let (xp, level, streak_count): (i64, i64, i64) = sqlx::query_as(
            "UPDATE users SET xp = xp + $1, level = (MAX(xp + $1, 0) / $2) + 1, \
             streak_count = $3, last_activity_date = $4 WHERE id = $5 \
             RETURNING xp, level, streak_count",
        )
        .bind(xp_gain)
        .bind(XP_PER_LEVEL)
        .bind(streak_count)
        .bind(at)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;

        self.xp = xp;
        self.level = level;
        self.streak_count = streak_count;
        self.last_activity_date = Some(at);
        Ok(())
    }

    pub async fn set_streak(&mut self, mm: &ModelManager, streak_count: i64) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET streak_count = $1 WHERE id = $2")
            .bind(streak_count)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.streak_count = streak_count;
        Ok(())
    }

    pub async fn leaderboard(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
    ) -> DatabaseResult<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as(
            "SELECT id, username, level, xp, streak_count FROM users \
             ORDER BY xp DESC, level DESC, username ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    /// 1-based position of the user in leaderboard order.
    pub async fn rank_of(&self, mm: &ModelManager) -> DatabaseResult<i64> {
        let ahead: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE xp > $1 OR (xp = $1 AND level > $2) OR (xp = $1 AND level = $2 AND username < $3)",
        )
        .bind(self.xp)
        .bind(self.level)
        .bind(&self.username)
        .fetch_one(mm.executor())
        .await?;
        Ok(ahead + 1)
    }

    /// Seed-only: sets level and xp directly.
    pub(crate) async fn force_progress(
        &mut self,
        mm: &ModelManager,
        level: i64,
        xp: i64,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET level = $1, xp = $2 WHERE id = $3")
            .bind(level)
            .bind(xp)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.level = level;
        self.xp = xp;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::model::test_support::test_mm;

    fn create_data(name: &str) -> UserEntityCreateUpdate {
        UserEntityCreateUpdate {
            username: name.to_string(),
            email: format!("{name}@orbit.test"),
            password_hash: String::from("x"),
            role: UserRole::User.to_string(),
            is_verified: false,
        }
    }

    #[tokio::test]
    async fn identity_lookup_accepts_username_or_email() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        let created = UserEntity::create(&mm, &admin, create_data("vega")).await.unwrap();

        let by_name = UserEntity::find_by_identity(&mm, &admin, "vega").await.unwrap();
        let by_mail = UserEntity::find_by_identity(&mm, &admin, "vega@orbit.test").await.unwrap();

        assert_eq!(by_name.unwrap().id(), created.id());
        assert_eq!(by_mail.unwrap().id(), created.id());
        assert!(UserEntity::find_by_identity(&mm, &admin, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn activity_adds_xp_and_steps_levels_every_thousand() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        let mut user = UserEntity::create(&mm, &admin, create_data("vega")).await.unwrap();
        let now = Utc::now();

        user.record_activity(&mm, 999, 1, now).await.unwrap();
        assert_eq!((user.xp(), user.level()), (999, 1));

        // a stale copy still adds on top of the stored value
        let mut stale = UserEntity::find_by_id(&mm, &admin, user.id()).await.unwrap().unwrap();
        user.record_activity(&mm, 1, 1, now).await.unwrap();
        assert_eq!((user.xp(), user.level()), (1000, 2));
        stale.record_activity(&mm, 9000, 2, now).await.unwrap();
        assert_eq!((stale.xp(), stale.level()), (10_000, 11));
        assert_eq!(stale.streak_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_email_is_unique_violation() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        UserEntity::create(&mm, &admin, create_data("vega")).await.unwrap();

        let mut dup = create_data("other");
        dup.email = String::from("vega@orbit.test");
        let err = UserEntity::create(&mm, &admin, dup).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn conflict_lookup_skips_self() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        let a = UserEntity::create(&mm, &admin, create_data("a")).await.unwrap();
        UserEntity::create(&mm, &admin, create_data("b")).await.unwrap();

        let own = UserEntity::find_conflict(&mm, &admin, "a", "a@orbit.test", Some(a.id()))
            .await
            .unwrap();
        assert!(own.is_none());

        let taken = UserEntity::find_conflict(&mm, &admin, "a", "b@orbit.test", Some(a.id()))
            .await
            .unwrap();
        assert_eq!(taken.unwrap().username(), "b");
    }

    #[tokio::test]
    async fn otp_expires_and_verification_clears_it() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        let mut user = UserEntity::create(&mm, &admin, create_data("vega")).await.unwrap();
        let now = Utc::now();
        user.set_otp(&mm, "123456", now + Duration::minutes(15)).await.unwrap();

        let stored = UserEntity::find_by_id(&mm, &admin, user.id()).await.unwrap().unwrap();
        assert!(stored.otp_matches("123456", now));
        assert!(!stored.otp_matches("654321", now));
        assert!(!stored.otp_matches("123456", now + Duration::minutes(16)));

        user.mark_verified(&mm).await.unwrap();
        let stored = UserEntity::find_by_id(&mm, &admin, user.id()).await.unwrap().unwrap();
        assert!(stored.is_verified());
        assert!(!stored.otp_matches("123456", now));
    }

    #[tokio::test]
    async fn leaderboard_orders_by_xp_level_name() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        for (name, xp) in [("carol", 300), ("bob", 500), ("alice", 300)] {
            let mut u = UserEntity::create(&mm, &admin, create_data(name)).await.unwrap();
            u.force_progress(&mm, 1, xp).await.unwrap();
        }

        let rows = UserEntity::leaderboard(&mm, &admin, 10).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, ["bob", "alice", "carol"]);

        let carol = UserEntity::find_by_username(&mm, &admin, "carol").await.unwrap().unwrap();
        assert_eq!(carol.rank_of(&mm).await.unwrap(), 3);
    }
}
