//! Wiring shared by every command: config, store, exporter, resolver.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::cli::GlobalOptions;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{Exporter, MarkdownSink};
use crate::history::Session;
use crate::kv::KeyValueStore;
use crate::output::OutputOptions;
use crate::partition::parse_date_arg;
use crate::profile::ProfileDirectory;
use crate::remote::{GhResolver, RemoteResolver};
use crate::storage::FileStore;
use crate::store::{RolloverReport, TaskStore};

pub(crate) struct Context {
    pub config: Config,
    pub kv: Arc<dyn KeyValueStore>,
    pub store: Arc<TaskStore>,
    pub resolver: Option<Arc<dyn RemoteResolver>>,
    pub output: OutputOptions,
    date: Option<NaiveDate>,
    cli_profile: Option<String>,
}

impl Context {
    pub async fn open(global: &GlobalOptions) -> Result<Self> {
        let config = Config::load_or_default(global.config.as_deref());
        let store_path = config.store_path(global.store.as_deref())?;
        tracing::debug!(store = %store_path.display(), "opening store");

        let date = global.date.as_deref().map(parse_date_arg).transpose()?;

        let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(store_path));
        let exporter = match (config.export.enabled, &config.export.dir) {
            (true, Some(dir)) => Exporter::new(Arc::new(MarkdownSink::new(dir.clone()))),
            _ => Exporter::disabled(),
        };
        let store = Arc::new(TaskStore::new(Arc::clone(&kv), exporter));

        let resolver: Option<Arc<dyn RemoteResolver>> = if config.github.enabled {
            let timeout = config.github.timeout_duration()?;
            Some(Arc::new(GhResolver::new(config.github.gh_bin.clone(), timeout)))
        } else {
            None
        };

        Ok(Self {
            config,
            kv,
            store,
            resolver,
            output: global.output,
            date,
            cli_profile: global.profile.clone(),
        })
    }

    /// `--date`, or today.
    pub fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| self.store.today())
    }

    pub async fn profiles(&self) -> Result<ProfileDirectory> {
        ProfileDirectory::load(Arc::clone(&self.kv)).await
    }

    pub async fn active_profile(&self) -> Result<String> {
        self.profiles().await?.resolve(self.cli_profile.as_deref())
    }

    pub fn require_resolver(&self) -> Result<Arc<dyn RemoteResolver>> {
        self.resolver.clone().ok_or_else(|| {
            Error::InvalidArgument("GitHub integration is disabled (github.enabled = false)".to_string())
        })
    }

    /// Open an editing session on the active (date, profile).
    pub async fn session(&self) -> Result<(Session, Option<RolloverReport>)> {
        let profile = self.active_profile().await?;
        Session::open(
            Arc::clone(&self.store),
            self.date(),
            &profile,
            self.config.history.max_depth,
            self.config.rollover.on_open,
        )
        .await
    }
}
