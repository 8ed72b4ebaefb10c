//! Config loading: TOML file → [`RawConfig`] → validated [`Config`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::raw::RawConfig;
use super::types::*;
use crate::error::RagError;
use crate::retrieval::fusion::{FusionWeights, SearchMode};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load config from `config_path`, or `config/default.toml` when `None`.
///
/// A missing default file is not an error: built-in defaults are used.
/// An explicit path that cannot be read is. `HYBRID_RAG_STORAGE_DIR` and
/// `HYBRID_RAG_LOG_LEVEL` override the file when set.
pub fn load(config_path: Option<&Path>) -> Result<Config, RagError> {
    let storage_override = env::var("HYBRID_RAG_STORAGE_DIR").ok();
    let level_override = env::var("HYBRID_RAG_LOG_LEVEL").ok();

    let raw = match config_path {
        Some(path) => read_raw(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_raw(default_path)?
            } else {
                tracing::debug!("no {DEFAULT_CONFIG_PATH}; using built-in defaults");
                RawConfig::default()
            }
        }
    };

    let mut cfg = resolve(raw, storage_override.as_deref(), level_override.as_deref())?;
    cfg.llm_api_key = env::var("LLM_API_KEY").ok();
    cfg.embedding_api_key = env::var("EMBEDDING_API_KEY").ok().or_else(|| cfg.llm_api_key.clone());
    Ok(cfg)
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars. API keys are
/// left unset.
pub fn load_from(
    path: &Path,
    storage_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, RagError> {
    let raw = read_raw(path)?;
    resolve(raw, storage_dir_override, log_level_override)
}

fn read_raw(path: &Path) -> Result<RawConfig, RagError> {
    let text = fs::read_to_string(path)
        .map_err(|e| RagError::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&text)
        .map_err(|e| RagError::Config(format!("parse error in {}: {e}", path.display())))
}

fn resolve(
    parsed: RawConfig,
    storage_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, RagError> {
    let p = parsed.pipeline;
    let storage_dir = expand_home(storage_dir_override.unwrap_or(&p.storage_dir));
    let log_level = log_level_override.unwrap_or(&p.log_level).to_string();
    let log_file = p.log_file.as_deref().map(expand_home);

    let c = parsed.chunking;
    if c.chunk_size == 0 {
        return Err(RagError::Config("chunking.chunk_size must be > 0".into()));
    }
    if c.chunk_overlap >= c.chunk_size {
        return Err(RagError::Config(format!(
            "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
            c.chunk_overlap, c.chunk_size
        )));
    }

    let r = parsed.retrieval;
    let default_mode: SearchMode = r
        .default_mode
        .parse()
        .map_err(|e| RagError::Config(format!("retrieval.default_mode: {e}")))?;
    if r.top_k == 0 {
        return Err(RagError::Config("retrieval.top_k must be > 0".into()));
    }
    FusionWeights::new(r.vector_weight, r.graph_weight)
        .map_err(|e| RagError::Config(format!("retrieval weights: {e}")))?;

    let g = parsed.graph;
    if g.entity_min_length == 0 {
        return Err(RagError::Config("graph.entity_min_length must be > 0".into()));
    }

    let e = parsed.embedding;
    if e.dimension == 0 {
        return Err(RagError::Config("embedding.dimension must be > 0".into()));
    }
    if e.batch_size == 0 {
        return Err(RagError::Config("embedding.batch_size must be > 0".into()));
    }

    let l = parsed.llm;

    Ok(Config {
        storage_dir,
        log_level,
        log_file,
        chunking: ChunkingConfig { chunk_size: c.chunk_size, chunk_overlap: c.chunk_overlap },
        retrieval: RetrievalConfig {
            default_mode,
            top_k: r.top_k,
            vector_weight: r.vector_weight,
            graph_weight: r.graph_weight,
            context_chunks: r.context_chunks,
        },
        graph: GraphConfig {
            entity_min_length: g.entity_min_length,
            preview_chars: g.preview_chars,
        },
        embedding: EmbeddingConfig {
            provider: e.provider,
            dimension: e.dimension,
            batch_size: e.batch_size,
            openai: OpenAiEmbeddingConfig {
                api_base_url: e.openai.api_base_url,
                model: e.openai.model,
                timeout_seconds: e.openai.timeout_seconds,
            },
        },
        llm: LlmConfig {
            provider: l.provider,
            max_new_tokens: l.max_new_tokens,
            temperature: l.temperature,
            top_p: l.top_p,
            prompt_template: l.prompt_template.as_deref().map(expand_home),
            openai: OpenAiConfig {
                api_base_url: l.openai.api_base_url,
                model: l.openai.model,
                timeout_seconds: l.openai.timeout_seconds,
            },
        },
        llm_api_key: None,
        embedding_api_key: None,
    })
}

/// Built-in defaults, identical to loading an empty TOML file. No env
/// overrides and no API keys.
pub fn defaults() -> Result<Config, RagError> {
    resolve(RawConfig::default(), None, None)
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_resolve() {
        let cfg = defaults().unwrap();
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.chunking.chunk_overlap, 50);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.retrieval.default_mode, SearchMode::Hybrid);
        assert_eq!(cfg.embedding.provider, "hashing");
        assert_eq!(cfg.embedding.dimension, 384);
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.max_new_tokens, 200);
    }

    #[test]
    fn empty_file_equals_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.graph.entity_min_length, 3);
        assert_eq!(cfg.graph.preview_chars, 200);
        assert!((cfg.retrieval.vector_weight - 0.7).abs() < 1e-6);
        assert!((cfg.retrieval.graph_weight - 0.3).abs() < 1e-6);
    }

    #[test]
    fn parse_sections() {
        let f = write_toml(
            r#"
[pipeline]
storage_dir = "/tmp/rag-store"
log_level = "debug"

[retrieval]
default_mode = "graph"
top_k = 8

[embedding]
default = "openai"

[embedding.openai]
model = "text-embedding-3-small"

[llm]
default = "openai"
temperature = 0.2
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.storage_dir, PathBuf::from("/tmp/rag-store"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.retrieval.default_mode, SearchMode::Graph);
        assert_eq!(cfg.retrieval.top_k, 8);
        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.embedding.openai.model, "text-embedding-3-small");
        assert_eq!(cfg.llm.provider, "openai");
        assert!((cfg.llm.temperature - 0.2).abs() < 1e-6);
    }

    #[test]
    fn overrides_win() {
        let f = write_toml("[pipeline]\nstorage_dir = \"/a\"\nlog_level = \"info\"\n");
        let cfg = load_from(f.path(), Some("/b"), Some("trace")).unwrap();
        assert_eq!(cfg.storage_dir, PathBuf::from("/b"));
        assert_eq!(cfg.log_level, "trace");
    }

    #[test]
    fn overlap_not_below_size_rejected() {
        let f = write_toml("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
        assert!(matches!(load_from(f.path(), None, None), Err(RagError::Config(_))));
    }

    #[test]
    fn unknown_mode_rejected() {
        let f = write_toml("[retrieval]\ndefault_mode = \"semantic\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("semantic"));
    }

    #[test]
    fn zero_weights_rejected() {
        let f = write_toml("[retrieval]\nvector_weight = 0.0\ngraph_weight = 0.0\n");
        assert!(matches!(load_from(f.path(), None, None), Err(RagError::Config(_))));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_from(Path::new("/definitely/not/here.toml"), None, None).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let f = write_toml("[retrieval\ntop_k = 3");
        assert!(matches!(load_from(f.path(), None, None), Err(RagError::Config(_))));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.hybrid-rag");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".hybrid-rag"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
