//! Runner: compose, wait for shutdown, stop.
//!
//! Shutdown can be driven by OS signals, an external `CancellationToken`,
//! or an arbitrary future. Loaded instances are stopped in reverse
//! declaration order; stop failures are logged and do not fail the run.

use anyhow::Context;
use std::{future::Future, pin::Pin, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::runtime::{compose, AppOptions, ComposedApp};

/// How the runner should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

pub struct RunOptions {
    pub app: AppOptions,
    pub shutdown: ShutdownOptions,
    /// Upper bound on composition; `None` waits as long as it takes.
    pub startup_timeout: Option<Duration>,
}

fn spawn_shutdown_waiter(shutdown: ShutdownOptions) -> CancellationToken {
    let cancel = match &shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match modkit_bootstrap::wait_for_shutdown().await {
                    Ok(signal) => tracing::info!(%signal, "shutdown: signal received"),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "shutdown: primary waiter failed; falling back to ctrl_c()"
                        );
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifecycle");
        }
    }

    cancel
}

/// Stop every loaded instance, last declared first.
pub async fn stop_modules(app: &ComposedApp) {
    tracing::info!("Phase: stop");
    for (module, instance) in app.modules.instances().rev() {
        if let Err(err) = instance.stop().await {
            tracing::warn!(module, error = %format!("{err:#}"), "Failed to stop module");
        }
    }
}

/// Compose `options`, failing if it takes longer than `timeout`.
pub async fn compose_within(
    options: AppOptions,
    timeout: Option<Duration>,
) -> anyhow::Result<ComposedApp> {
    let Some(timeout) = timeout else {
        return compose(options).await.context("Composition failed");
    };
    tokio::time::timeout(timeout, compose(options))
        .await
        .with_context(|| format!("Composition did not finish within {timeout:?}"))?
        .context("Composition failed")
}

/// Full cycle: compose → wait → stop.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = spawn_shutdown_waiter(opts.shutdown);

    let app = compose_within(opts.app, opts.startup_timeout).await?;

    cancel.cancelled().await;

    stop_modules(&app).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BootstrapCatalog;
    use crate::contracts::{BootstrapRequest, ListRequest, ModuleService};
    use crate::declaration::{ModuleDeclaration, ModulesConfig};
    use crate::link::LinkCapability;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::any::Any;
    use std::sync::Arc;

    struct Recorder {
        name: String,
        stopped: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl ModuleService for Recorder {
        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn list(&self, _: &ListRequest) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.stopped.lock().push(self.name.clone());
            if self.fail {
                anyhow::bail!("{} refused to stop", self.name);
            }
            Ok(())
        }
    }

    fn options(stopped: Arc<Mutex<Vec<String>>>) -> AppOptions {
        with_modules(
            stopped,
            ModulesConfig::new()
                .with("a", ModuleDeclaration::resolve("./recorder"))
                .with("b", ModuleDeclaration::resolve("./recorder"))
                .with("c", ModuleDeclaration::resolve("./recorder")),
        )
    }

    fn with_modules(stopped: Arc<Mutex<Vec<String>>>, modules: ModulesConfig) -> AppOptions {
        let catalog = BootstrapCatalog::new().with(
            "./recorder",
            Arc::new(move |req: BootstrapRequest| {
                let stopped = stopped.clone();
                async move {
                    let name = req.declaration.options["tag"]
                        .as_str()
                        .map_or_else(|| req.module_name.clone(), str::to_owned);
                    let svc: Arc<dyn ModuleService> = Arc::new(Recorder {
                        fail: req.module_name == "a",
                        name,
                        stopped,
                    });
                    Ok::<_, anyhow::Error>(svc)
                }
            }),
        )
        .with(
            "./stuck",
            Arc::new(|_req: BootstrapRequest| async move {
                std::future::pending::<()>().await;
                Err::<Arc<dyn ModuleService>, _>(anyhow::anyhow!("unreachable"))
            }),
        );
        AppOptions::new(modules)
            .with_catalog(Arc::new(catalog))
            .with_link_capability(LinkCapability::Absent)
    }

    #[tokio::test]
    async fn run_stops_modules_in_reverse_order_on_token_cancel() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        run(RunOptions {
            app: options(stopped.clone()),
            shutdown: ShutdownOptions::Token(cancel),
            startup_timeout: None,
        })
        .await
        .unwrap();

        assert_eq!(*stopped.lock(), ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn run_ends_when_shutdown_future_completes() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        run(RunOptions {
            app: options(stopped.clone()),
            shutdown: ShutdownOptions::Future(Box::pin(async {})),
            startup_timeout: None,
        })
        .await
        .unwrap();
        assert_eq!(stopped.lock().len(), 3);
    }

    #[tokio::test]
    async fn repeated_module_stops_in_reverse_declaration_slot() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let recorder = |tag: &str| {
            ModuleDeclaration::resolve("./recorder").with_options(serde_json::json!({ "tag": tag }))
        };
        let modules = ModulesConfig::new()
            .with("cart", recorder("cart#1"))
            .with("product", recorder("product"))
            .with("cart", recorder("cart#2"));

        run(RunOptions {
            app: with_modules(stopped.clone(), modules),
            shutdown: ShutdownOptions::Future(Box::pin(async {})),
            startup_timeout: None,
        })
        .await
        .unwrap();

        assert_eq!(*stopped.lock(), ["cart#2", "product", "cart#1"]);
    }

    #[tokio::test]
    async fn run_fails_when_composition_exceeds_startup_timeout() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let modules = ModulesConfig::new()
            .with("a", ModuleDeclaration::resolve("./recorder"))
            .with("slow", ModuleDeclaration::resolve("./stuck"));

        let err = run(RunOptions {
            app: with_modules(stopped.clone(), modules),
            shutdown: ShutdownOptions::Future(Box::pin(async {})),
            startup_timeout: Some(Duration::from_millis(50)),
        })
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("did not finish within"));
        assert!(stopped.lock().is_empty());
    }
}
