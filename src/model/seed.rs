use crate::{
    auth::hash_password,
    model::{
        CrudRepository, DatabaseResult, ModelManager,
        entity::{UserEntity, UserEntityCreateUpdate},
    },
    web::{AuthenticatedUser, UserRole},
};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@astrodatahub.com";

/// Creates the built-in administrator unless an account with its username exists.
#[tracing::instrument(skip_all)]
pub async fn ensure_admin(mm: &ModelManager, password: &str) -> DatabaseResult<()> {
    let actor = AuthenticatedUser::admin();
    if UserEntity::find_by_username(mm, &actor, ADMIN_USERNAME)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let mut admin = UserEntity::create(
        mm,
        &actor,
        UserEntityCreateUpdate {
            username: ADMIN_USERNAME.to_string(),
            email: ADMIN_EMAIL.to_string(),
            password_hash: hash_password(password)?,
            role: UserRole::Admin.to_string(),
            is_verified: true,
        },
    )
    .await?;
    admin.force_progress(mm, 99, 10_000).await?;

    tracing::info!("seeded administrator account '{ADMIN_USERNAME}'");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::auth::verify_password;
    use crate::model::test_support::test_mm;

    #[tokio::test]
    async fn admin_is_seeded_once() {
        let mm = test_mm().await;
        ensure_admin(&mm, "admin123").await.unwrap();
        ensure_admin(&mm, "other").await.unwrap();

        let actor = AuthenticatedUser::admin();
        assert_eq!(UserEntity::count(&mm, &actor).await.unwrap(), 1);

        let admin = UserEntity::find_by_identity(&mm, &actor, ADMIN_EMAIL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role(), UserRole::Admin);
        assert_eq!(admin.level(), 99);
        assert!(admin.is_verified());
        assert!(verify_password(admin.hash(), "admin123").unwrap());
    }
}
