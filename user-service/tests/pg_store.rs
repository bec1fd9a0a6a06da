use std::env;

use anyhow::Result;
use user_service::store::{NewUser, PgUserStore, StoreError, UserStore, UserUpdate};

#[tokio::test]
#[cfg_attr(
    not(feature = "integration"),
    ignore = "enable with --features integration (requires USER_TEST_DATABASE_URL)"
)]
async fn postgres_store_round_trip() -> Result<()> {
    let Ok(url) = env::var("USER_TEST_DATABASE_URL") else {
        eprintln!("Skipping Postgres store test: set USER_TEST_DATABASE_URL to run it.");
        return Ok(());
    };

    let store = PgUserStore::connect(&url).await?;
    let email = format!("pg-{}@example.com", uuid::Uuid::new_v4());

    let created = store
        .create(NewUser {
            name: "pg".into(),
            email: email.clone(),
            password_hash: "digest".into(),
        })
        .await?;
    assert_eq!(store.find_by_email(&email).await?, Some(created.clone()));

    let duplicate = store
        .create(NewUser {
            name: "again".into(),
            email: email.clone(),
            password_hash: "digest".into(),
        })
        .await;
    assert!(matches!(duplicate, Err(StoreError::DuplicateEmail)));

    let updated = store
        .update(
            created.id,
            UserUpdate {
                name: "renamed".into(),
                email: email.clone(),
                password_hash: "digest2".into(),
            },
        )
        .await?;
    assert_eq!(updated.map(|user| user.name), Some("renamed".to_string()));

    assert_eq!(store.delete(created.id).await?, 1);
    assert_eq!(store.delete(created.id).await?, 0);
    assert!(store.get(created.id).await?.is_none());
    Ok(())
}
