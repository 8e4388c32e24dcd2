//! CLI route: single route table and run context. Dispatches to the runners and presentation.

use crate::catalog::Catalog;
use crate::classify::{list_images, ClassificationRunner, OpenAiVisionClassifier};
use crate::cli::parse::{Commands, ReferenceMode, StatusFormat};
use crate::cli::presentation::{
    format_classification_summary, format_plan, format_run_summary, format_status_json,
    format_status_text, ConsoleObserver, StatusView,
};
use crate::config::{AppConfig, ConfigLoader};
use crate::error::ApiError;
use crate::generation::OpenAiImageClient;
use crate::key::WorkItem;
use crate::manifest::ProgressStore;
use crate::pipeline::{PipelineRunner, RunPlan};
use crate::reference::{DirectoryReferenceSource, NoReference, ReferenceSource, WebReferenceFetcher};
use crate::retry::TokioSleeper;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Runtime context for CLI execution: workspace root and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: AppConfig,
}

/// Only an explicit `yes`, in any case, starts a paid run.
pub fn confirmation_accepted(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("yes")
}

const CONFIRM_PROMPT: &str = "Type 'yes' to proceed";

/// First line of a piped stdin. EOF or a read error counts as no answer.
pub fn read_piped_answer<R: BufRead>(mut reader: R) -> String {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(_) => line,
        Err(e) => {
            warn!(error = %e, "Failed to read confirmation from stdin");
            String::new()
        }
    }
}

impl RunContext {
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(&workspace_root, config_path.as_deref())?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn from_config(workspace_root: PathBuf, config: AppConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    ///
    /// Returns [`ApiError::Cancelled`] when the operator declines the prompt.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Generate {
                references,
                references_dir,
                yes,
            } => {
                self.handle_generate(*references, references_dir.as_deref(), *yes)
                    .await
            }
            Commands::Regenerate {
                flagged_dir,
                references,
                references_dir,
                yes,
            } => {
                self.handle_regenerate(flagged_dir, *references, references_dir.as_deref(), *yes)
                    .await
            }
            Commands::Classify { dir } => self.handle_classify(dir.as_deref()).await,
            Commands::Status { format } => self.handle_status(*format),
        }
    }

    fn load_catalog(&self) -> Result<Catalog, ApiError> {
        Catalog::load(&self.config.catalog_path(&self.workspace_root))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn build_references(
        &self,
        mode: ReferenceMode,
        dir: Option<&Path>,
    ) -> Result<Arc<dyn ReferenceSource>, ApiError> {
        Ok(match mode {
            ReferenceMode::Web => Arc::new(WebReferenceFetcher::new(
                self.config.web_reference_settings(&self.workspace_root),
            )?),
            ReferenceMode::Dir => {
                let dir = dir.map(|d| self.resolve(d)).ok_or_else(|| {
                    ApiError::ConfigError("--references dir requires --references-dir".to_string())
                })?;
                let source = DirectoryReferenceSource::open(&dir)?;
                info!(dir = %dir.display(), references = source.len(), "Using directory references");
                Arc::new(source)
            }
            ReferenceMode::None => Arc::new(NoReference),
        })
    }

    fn build_runner(
        &self,
        mode: ReferenceMode,
        references_dir: Option<&Path>,
    ) -> Result<PipelineRunner, ApiError> {
        let api_key = self.config.api_key()?;
        let generator = Arc::new(OpenAiImageClient::new(
            self.config.image_client_settings(api_key),
        )?);
        let references = self.build_references(mode, references_dir)?;
        Ok(PipelineRunner::new(
            self.config.pipeline_config(&self.workspace_root),
            generator,
            references,
            Arc::new(TokioSleeper),
        ))
    }

    fn confirm(&self, plan_text: &str, yes: bool) -> Result<(), ApiError> {
        println!("{}", plan_text);
        if yes {
            return Ok(());
        }
        let stdin = std::io::stdin();
        let input = if stdin.is_terminal() {
            use dialoguer::Input;
            Input::<String>::new()
                .with_prompt(CONFIRM_PROMPT)
                .allow_empty(true)
                .interact_text()
                .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?
        } else {
            print!("{}: ", CONFIRM_PROMPT);
            let _ = std::io::stdout().flush();
            read_piped_answer(stdin.lock())
        };
        if confirmation_accepted(&input) {
            Ok(())
        } else {
            Err(ApiError::Cancelled)
        }
    }

    async fn handle_generate(
        &self,
        mode: ReferenceMode,
        references_dir: Option<&Path>,
        yes: bool,
    ) -> Result<String, ApiError> {
        let items = self.load_catalog()?.work_items();
        let mut runner = self.build_runner(mode, references_dir)?;

        let plan = runner.plan(&items);
        if plan.remaining() == 0 {
            return Ok(format!("All {} items are already generated.", plan.total()));
        }
        let config = runner.config();
        self.confirm(
            &format_plan(&plan, config.cost_per_image, config.request_delay),
            yes,
        )?;

        let mut observer = ConsoleObserver::stdout();
        let summary = runner.run(&items, &mut observer).await?;
        Ok(format_run_summary(&summary, Some(runner.error_log().path())))
    }

    async fn handle_regenerate(
        &self,
        flagged_dir: &Path,
        mode: ReferenceMode,
        references_dir: Option<&Path>,
        yes: bool,
    ) -> Result<String, ApiError> {
        let index = self.load_catalog()?.key_index();
        let flagged_dir = self.resolve(flagged_dir);
        if !flagged_dir.is_dir() {
            return Err(ApiError::ConfigError(format!(
                "Flagged directory not found: {}",
                flagged_dir.display()
            )));
        }

        let mut items: Vec<WorkItem> = Vec::new();
        for entry in WalkDir::new(&flagged_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            match index.lookup_file_name(&name) {
                Some(item) => items.push(item.clone()),
                None => warn!(file = %name, "Flagged file does not match any catalog item"),
            }
        }
        if items.is_empty() {
            return Ok("No flagged files matched the catalog.".to_string());
        }

        let mut runner = self.build_runner(mode, references_dir)?;
        let plan = RunPlan {
            to_skip: Vec::new(),
            to_process: items.clone(),
        };
        let config = runner.config();
        self.confirm(
            &format_plan(&plan, config.cost_per_image, config.request_delay),
            yes,
        )?;

        let mut observer = ConsoleObserver::stdout();
        let summary = runner.regenerate(&items, &mut observer).await?;
        Ok(format_run_summary(&summary, Some(runner.error_log().path())))
    }

    async fn handle_classify(&self, dir: Option<&Path>) -> Result<String, ApiError> {
        let dir = match dir {
            Some(d) => self.resolve(d),
            None => self.config.pipeline_config(&self.workspace_root).output_dir,
        };
        let files = list_images(&dir)?;
        let api_key = self.config.api_key()?;
        let classifier = Arc::new(OpenAiVisionClassifier::new(
            self.config.vision_client_settings(api_key),
        )?);
        let config = self.config.classification_config(&self.workspace_root);
        let cache_path = config.cache_file.clone();

        let mut runner = ClassificationRunner::new(config, classifier, Arc::new(TokioSleeper));
        let summary = runner.run(&files).await?;
        Ok(format_classification_summary(&summary, &cache_path))
    }

    fn handle_status(&self, format: StatusFormat) -> Result<String, ApiError> {
        let pipeline = self.config.pipeline_config(&self.workspace_root);
        let store = ProgressStore::load(&pipeline.progress_file, pipeline.artifact_layout());
        let items = match self.load_catalog() {
            Ok(catalog) => Some(catalog.work_items()),
            Err(e) => {
                warn!(error = %e, "Catalog unavailable, showing manifest only");
                None
            }
        };
        let view = StatusView::from_store(&store, items.as_deref());
        match format {
            StatusFormat::Text => Ok(format_status_text(&view)),
            StatusFormat::Json => format_status_json(&view),
        }
    }
}
