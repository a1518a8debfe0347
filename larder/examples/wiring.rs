//! Wiring a small object graph through a process-wide container.
//!
//! Run with `RUST_LOG=larder_container=debug cargo run --example wiring`
//! to watch slots being built and cleaned up.

use std::sync::Arc;

use larder::prelude::*;
use once_cell::sync::Lazy;
use tracing::info;

// === Services ===

struct Settings {
    value: String,
}

struct Repository {
    settings: Arc<Settings>,
}

struct Service {
    settings: Arc<Settings>,
    repository: Arc<Repository>,
}

// === Identifiers ===

static SETTINGS: Lazy<ObjectId<Settings>> = Lazy::new(ObjectId::of);
static REPOSITORY: Lazy<ObjectId<Repository>> = Lazy::new(ObjectId::of);
static SERVICE: Lazy<ObjectId<Service>> = Lazy::new(ObjectId::of);

static CONTAINER: Lazy<Container> = Lazy::new(|| {
    let container = Container::new();
    container.add_provider(&AppProvider);
    container
});

// === Registrations ===

struct AppProvider;

impl Provider for AppProvider {
    fn register(&self, container: &Container) {
        container
            .register_async(&SETTINGS, |_| async {
                Ok(Settings {
                    value: "foobar".to_string(),
                })
            })
            .register_with(
                &REPOSITORY,
                Loader::from_async(|c: Container| async move {
                    let settings = c.resolve(&SETTINGS).await?;
                    Ok(Repository { settings })
                })
                .with_sync_cleaner(|_: &Repository| info!("Repository closed")),
            )
            .register_async(&SERVICE, |c| async move {
                let awaited = c
                    .await_all([("settings", SETTINGS.any()), ("repository", REPOSITORY.any())])
                    .await?;
                let missing = || LarderError::custom("await_all result is incomplete");
                Ok(Service {
                    settings: awaited.get("settings").ok_or_else(missing)?,
                    repository: awaited.get("repository").ok_or_else(missing)?,
                })
            });
    }
}

#[tokio::main]
async fn main() -> larder::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("initial instances: {:?}", CONTAINER.instances());

    let service = CONTAINER.resolve(&SERVICE).await?;
    println!(
        "service.repository.settings.value: {}",
        service.repository.settings.value
    );
    assert!(Arc::ptr_eq(&service.settings, &service.repository.settings));
    println!("instances after resolving the service: {:?}", CONTAINER.instances());

    CONTAINER.cleanup([REPOSITORY.any()]).await?;
    println!("instances after cleaning up the repository: {:?}", CONTAINER.instances());

    CONTAINER.cleanup_all().await?;
    println!("instances after cleanup: {:?}", CONTAINER.instances());

    Ok(())
}
