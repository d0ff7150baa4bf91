//! Logging bootstrap: human console output plus JSON files routed by target.
//!
//! Each key of [`LoggingConfig`] other than `default` names a target prefix
//! (a crate path such as `modkit::runtime`). Records whose target matches a
//! prefix go to that section's file; everything else goes to the `default`
//! section. `RUST_LOG`, when set, caps both sinks.

use crate::config::{LoggingConfig, Section};
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::{self, MakeWriter};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

// Flushes the non-blocking console writer on drop; must live for the process.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// `None` means the sink is switched off. Unknown strings fall back to INFO.
fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" | "" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" | "none" => None,
        _ => Some(LevelFilter::INFO),
    }
}

fn target_matches(target: &str, prefix: &str) -> bool {
    target == prefix
        || target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with("::"))
}

// ---------- rotating files ----------

type SharedRotate = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct FileSink(SharedRotate);

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut f) => f.write(buf),
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut f) => f.flush(),
            Err(_) => Ok(()),
        }
    }
}

/// A writer that silently drops output when no file is configured.
struct MaybeFile(Option<FileSink>);

impl Write for MaybeFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(sink) => sink.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

fn open_rotating(path: &Path, section: &Section) -> std::io::Result<FileSink> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) as usize * 1024 * 1024;
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(
            i64::from(section.max_age_days.unwrap_or(1)),
        )),
    };
    let rotate = FileRotate::new(
        path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Ok(FileSink(Arc::new(Mutex::new(rotate))))
}

/// Routes each record to the file of the longest matching target prefix.
#[derive(Clone, Default)]
struct FileRouter {
    fallback: Option<FileSink>,
    routes: Vec<(String, FileSink)>,
}

impl FileRouter {
    fn build(cfg: &LoggingConfig, base_dir: &Path) -> Self {
        let mut router = FileRouter::default();
        for (name, section) in cfg {
            if section.file.trim().is_empty() {
                continue;
            }
            let path = resolve_log_path(&section.file, base_dir);
            match open_rotating(&path, section) {
                Ok(sink) if name == DEFAULT_SECTION => router.fallback = Some(sink),
                Ok(sink) => router.routes.push((name.clone(), sink)),
                Err(e) => eprintln!(
                    "Failed to open log file '{}' for '{}': {}",
                    path.display(),
                    name,
                    e
                ),
            }
        }
        // Longest prefix first so `a::b` wins over `a`.
        router.routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        router
    }

    fn route(&self, target: &str) -> Option<FileSink> {
        self.routes
            .iter()
            .find(|(prefix, _)| target_matches(target, prefix))
            .map(|(_, sink)| sink.clone())
            .or_else(|| self.fallback.clone())
    }

    fn is_empty(&self) -> bool {
        self.fallback.is_none() && self.routes.is_empty()
    }
}

impl<'a> MakeWriter<'a> for FileRouter {
    type Writer = MaybeFile;

    fn make_writer(&'a self) -> Self::Writer {
        MaybeFile(self.fallback.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        MaybeFile(self.route(meta.target()))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

// ---------- level filters ----------

#[derive(Clone, Copy)]
enum Sink {
    Console,
    File,
}

impl Sink {
    fn level_of(self, section: &Section) -> Option<LevelFilter> {
        match self {
            Sink::Console => parse_level(&section.console_level),
            Sink::File if section.file.trim().is_empty() => None,
            Sink::File => parse_level(&section.file_level),
        }
    }
}

fn build_targets(cfg: &LoggingConfig, sink: Sink) -> Targets {
    let default_level = cfg
        .get(DEFAULT_SECTION)
        .map(|s| sink.level_of(s).unwrap_or(LevelFilter::OFF))
        .unwrap_or(match sink {
            Sink::Console => LevelFilter::INFO,
            Sink::File => LevelFilter::OFF,
        });

    let per_target: HashMap<&str, LevelFilter> = cfg
        .iter()
        .filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
        .map(|(name, section)| {
            (
                name.as_str(),
                sink.level_of(section).unwrap_or(LevelFilter::OFF),
            )
        })
        .collect();

    Targets::new()
        .with_default(default_level)
        .with_targets(per_target)
}

// ---------- public init ----------

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    if cfg.is_empty() {
        init_minimal();
        return;
    }

    let router = FileRouter::build(cfg, base_dir);
    install(
        build_targets(cfg, Sink::Console),
        build_targets(cfg, Sink::File),
        router,
    );
}

fn install(console_targets: Targets, file_targets: Targets, router: FileRouter) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env = EnvFilter::try_from_default_env().ok();

    let (stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console = fmt::layer()
        .with_writer(stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets);

    let files = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(file_targets)
    });

    let _ = tracing_subscriber::registry()
        .with(env)
        .with(console)
        .with(files)
        .try_init();
}

fn init_minimal() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(env)
        .with(
            fmt::layer()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339()),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.into(),
            file: file.into(),
            file_level: file_level.into(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn parse_level_handles_off_and_unknown() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level("chatty"), Some(LevelFilter::INFO));
        assert_eq!(parse_level(""), Some(LevelFilter::INFO));
    }

    #[test]
    fn target_prefix_requires_path_boundary() {
        assert!(target_matches("modkit", "modkit"));
        assert!(target_matches("modkit::runtime::loader", "modkit"));
        assert!(!target_matches("modkit_db", "modkit"));
    }

    #[test]
    fn targets_follow_sections() {
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("warn", "", ""));
        cfg.insert("modkit".into(), section("debug", "logs/modkit.log", "trace"));

        let console = build_targets(&cfg, Sink::Console);
        assert!(console.would_enable("modkit::runtime", &tracing::Level::DEBUG));
        assert!(!console.would_enable("cart", &tracing::Level::INFO));

        let file = build_targets(&cfg, Sink::File);
        assert!(file.would_enable("modkit::schema", &tracing::Level::TRACE));
        // default section has no file
        assert!(!file.would_enable("cart", &tracing::Level::ERROR));
    }

    #[test]
    fn router_prefers_longest_prefix_and_falls_back() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/all.log", "info"));
        cfg.insert("modkit".into(), section("info", "logs/modkit.log", "info"));
        cfg.insert(
            "modkit::query".into(),
            section("info", "logs/query.log", "info"),
        );

        let router = FileRouter::build(&cfg, tmp.path());
        assert_eq!(router.routes[0].0, "modkit::query");
        assert!(router.route("modkit::query::engine").is_some());
        assert!(router.route("cart").is_some(), "falls back to default file");
        assert!(tmp.path().join("logs").exists());
    }

    #[test]
    fn router_without_files_is_empty() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "  ", "info"));
        let router = FileRouter::build(&cfg, tmp.path());
        assert!(router.is_empty());
        assert!(router.route("anything").is_none());
    }
}
