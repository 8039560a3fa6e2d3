//! End-to-end account flows against the in-memory store

use std::collections::HashSet;
use std::sync::Arc;

use accounts::hashers::{Argon2Hasher, Pbkdf2Sha256Hasher};
use accounts::models::PermissionNaturalKey;
use accounts::{
    AccountService, Authorizer, Catalog, Hashers, LogMailer, MemoryStore, ModelBackend,
    RegisteredBackend, Target, UserLookup,
};
use serde_json::json;

fn test_hashers() -> Hashers {
    Hashers::new(vec![
        Arc::new(Argon2Hasher::new(1024, 1, 1).unwrap()),
        Arc::new(Pbkdf2Sha256Hasher::new(1_000).unwrap()),
    ])
    .unwrap()
}

struct Setup {
    catalog: Catalog<MemoryStore>,
    service: AccountService<MemoryStore>,
    authorizer: Authorizer,
}

async fn setup() -> Setup {
    let store = Arc::new(MemoryStore::new());
    let mut catalog = Catalog::new(store.clone());
    catalog.register_lookup("accounts", "user", Arc::new(UserLookup::new(store.clone())));

    for (name, app_label, model) in [("article", "blog", "article"), ("trip", "trips", "trip")] {
        let content_type = catalog
            .get_or_create_content_type(name, app_label, model)
            .await
            .unwrap();
        catalog.ensure_default_permissions(&content_type).await.unwrap();
    }

    let service = AccountService::new(
        store.clone(),
        test_hashers(),
        Arc::new(LogMailer::new("webmaster@localhost")),
        "webmaster@localhost",
    );
    let authorizer = Authorizer::new(vec![RegisteredBackend::Basic(Arc::new(ModelBackend::new(
        store,
    )))]);

    Setup {
        catalog,
        service,
        authorizer,
    }
}

#[tokio::test]
async fn registered_user_gains_and_loses_permissions() {
    let Setup {
        catalog,
        service,
        authorizer,
        ..
    } = setup().await;

    let user = service
        .create_user("bob", "correct horse", Some("Bob@EXAMPLE.com"))
        .await
        .unwrap();
    assert_eq!(user.email, "Bob@example.com");
    assert!(!authorizer.has_permission(&user, "blog.add_article", None).await.unwrap());

    let add = catalog
        .permission_by_natural_key("add_article", "blog", "article")
        .await
        .unwrap();
    let user = service.grant_permission(user, &add).await.unwrap();

    assert!(authorizer.has_permission(&user, "blog.add_article", None).await.unwrap());
    assert!(authorizer.has_module_permissions(&user, "blog").await.unwrap());
    assert!(!authorizer.has_module_permissions(&user, "trips").await.unwrap());
    assert_eq!(
        authorizer.all_permissions(&user, None).await.unwrap(),
        HashSet::from(["blog.add_article".to_string()])
    );
    assert!(authorizer.all_group_permissions(&user, None).await.unwrap().is_empty());

    let target = Target::new("blog", "article", "7");
    assert!(!authorizer
        .has_permission(&user, "blog.add_article", Some(&target))
        .await
        .unwrap());

    let user = service.revoke_permission(user, &add).await.unwrap();
    assert!(!authorizer.has_permission(&user, "blog.add_article", None).await.unwrap());
}

#[tokio::test]
async fn superuser_passes_every_check() {
    let Setup {
        service, authorizer, ..
    } = setup().await;

    let admin = service
        .create_superuser("admin", "pw", "admin@trotamundia.com")
        .await
        .unwrap();

    assert!(authorizer.has_permission(&admin, "anything.at_all", None).await.unwrap());
    assert!(authorizer
        .has_permissions(&admin, &["blog.add_article", "trips.delete_trip"], None)
        .await
        .unwrap());
    assert_eq!(authorizer.all_permissions(&admin, None).await.unwrap().len(), 6);
}

#[tokio::test]
async fn login_flow() {
    let Setup { service, .. } = setup().await;

    service
        .create_user("carol", "first-pass", Some("carol@example.com"))
        .await
        .unwrap();

    let carol = service.authenticate("carol", "first-pass").await.unwrap().unwrap();
    assert!(service.authenticate("carol", "nope").await.unwrap().is_none());

    let carol = service.set_credential(carol, "second-pass").await.unwrap();
    assert!(service.authenticate("carol", "first-pass").await.unwrap().is_none());
    assert!(service.authenticate("carol", "second-pass").await.unwrap().is_some());

    service.set_unusable_credential(carol).await.unwrap();
    assert!(service.authenticate("carol", "second-pass").await.unwrap().is_none());
}

#[tokio::test]
async fn natural_keys_round_trip() {
    let Setup { catalog, .. } = setup().await;

    let trip = catalog.content_type_by_natural_key("trips", "trip").await.unwrap();
    assert_eq!(trip.natural_key(), ("trips".to_string(), "trip".to_string()));

    let key = PermissionNaturalKey::new("change_trip", "trips", "trip");
    let permission = catalog
        .permission_by_natural_key("change_trip", "trips", "trip")
        .await
        .unwrap();
    assert_eq!(catalog.permission_natural_key(&permission).await.unwrap(), key);
    assert_eq!(catalog.permission_label(&permission).await.unwrap(), "trips.change_trip");

    assert!(catalog
        .content_type_by_natural_key("trips", "boat")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn content_types_locate_users() {
    let Setup {
        catalog, service, ..
    } = setup().await;

    let user = service
        .create_user("dana", "pw", Some("dana@example.com"))
        .await
        .unwrap();
    let user_type = catalog
        .get_or_create_content_type("user", "accounts", "user")
        .await
        .unwrap();

    let filter = json!({ "username": "dana" }).as_object().cloned().unwrap();
    let found = catalog.locate_instance(&user_type, &filter).await.unwrap();
    assert_eq!(found["uid"], json!(user.uid));

    let missing = json!({ "username": "nobody" }).as_object().cloned().unwrap();
    assert!(catalog
        .locate_instance(&user_type, &missing)
        .await
        .unwrap_err()
        .is_not_found());

    let article = catalog.content_type_by_natural_key("blog", "article").await.unwrap();
    assert!(catalog
        .locate_instance(&article, &filter)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn content_types_locate_users_by_any_field() {
    let Setup {
        catalog, service, ..
    } = setup().await;

    service
        .create_user("frank", "pw", Some("frank@example.com"))
        .await
        .unwrap();
    let mut erin = service
        .create_user("erin", "pw", Some("erin@example.com"))
        .await
        .unwrap();
    erin.is_staff = true;
    let erin = service.save(erin).await.unwrap();
    let user_type = catalog
        .get_or_create_content_type("user", "accounts", "user")
        .await
        .unwrap();

    let staff = json!({ "is_staff": true }).as_object().cloned().unwrap();
    let found = catalog.locate_instance(&user_type, &staff).await.unwrap();
    assert_eq!(found["username"], json!("erin"));
    assert_eq!(found["id"], json!(erin.id.to_string()));

    let superusers = json!({ "is_superuser": true }).as_object().cloned().unwrap();
    assert!(catalog
        .locate_instance(&user_type, &superusers)
        .await
        .unwrap_err()
        .is_not_found());
}
