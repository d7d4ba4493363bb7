use std::future::Future;
use std::time::Duration;
use log::info;
use tokio::time::sleep;

use crate::error::PushError;
use crate::push::constants::{SERVICE_WORKER_SCOPE, SERVICE_WORKER_SCRIPT};
use crate::push::platform::PushPlatform;

/**
 * Registers the service worker once `stable` resolves, or after `delay` if the application takes
 * longer than that to settle.
 */
pub async fn register_when_stable<F>(platform: &dyn PushPlatform, stable: F, delay: Duration) -> Result<String, PushError>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = stable => {
            info!("Application is stable, registering service worker");
        }
        _ = sleep(delay) => {
            info!("Application did not become stable within {:?}, registering service worker anyway", delay);
        }
    }

    let registration = platform.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await?;
    Ok(registration.scope())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::constants::PUSH_SERVICE_URL;
    use crate::push::local::LocalPushPlatform;

    #[tokio::test]
    async fn registers_as_soon_as_stable() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);

        let scope = register_when_stable(&platform, std::future::ready(()), Duration::from_secs(3600)).await.unwrap();

        assert_eq!(scope, SERVICE_WORKER_SCOPE);
        let registration = platform.registration().await.unwrap().unwrap();
        assert_eq!(registration.script(), SERVICE_WORKER_SCRIPT);
    }

    #[tokio::test(start_paused = true)]
    async fn registers_after_delay_when_never_stable() {
        let platform = LocalPushPlatform::new(PUSH_SERVICE_URL);

        let scope = register_when_stable(&platform, std::future::pending(), Duration::from_millis(30000)).await.unwrap();

        assert_eq!(scope, SERVICE_WORKER_SCOPE);
    }
}
