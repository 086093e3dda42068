//! Carregamento dos três documentos de configuração do runtime.
//!
//! A struct [`RuntimeConfig`] reúne a definição da máquina de estados, a
//! gramática das tarefas e os limiares. O formato é escolhido pela extensão
//! do arquivo: `.toml` usa `toml`, qualquer outra usa JSON.
//! Documentos malformados falham aqui, antes do loop de execução começar.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::RuntimeError;
use crate::state_machine::StateMachineDefinition;
use crate::task::TaskGrammar;
use crate::threshold::ThresholdModel;

/// Caminhos dos três documentos de configuração.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub state_machine: PathBuf,
    pub task_grammar: PathBuf,
    pub thresholds: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            state_machine: PathBuf::from("config/runtime/state_machine.json"),
            task_grammar: PathBuf::from("config/runtime/task_grammar.json"),
            thresholds: PathBuf::from("config/runtime/threshold.json"),
        }
    }
}

/// O documento de limiares tem uma chave de nível superior `thresholds`.
#[derive(Debug, Deserialize)]
struct ThresholdDocument {
    thresholds: ThresholdModel,
}

/// Configuração completa consumida por [`Runtime`](crate::orchestrator::Runtime).
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub state_machine: StateMachineDefinition,
    pub grammar: TaskGrammar,
    pub thresholds: ThresholdModel,
}

impl RuntimeConfig {
    /// Lê e valida os três documentos.
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        let state_machine: StateMachineDefinition = read_document(&paths.state_machine)
            .with_context(|| {
                format!("failed to load state machine from {}", paths.state_machine.display())
            })?;
        let grammar: TaskGrammar = read_document(&paths.task_grammar).with_context(|| {
            format!("failed to load task grammar from {}", paths.task_grammar.display())
        })?;
        let document: ThresholdDocument = read_document(&paths.thresholds).with_context(|| {
            format!("failed to load thresholds from {}", paths.thresholds.display())
        })?;

        let config = Self {
            state_machine,
            grammar,
            thresholds: document.thresholds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Verifica o grafo de estados e os limiares.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.state_machine.validate()?;
        self.thresholds.validate()
    }
}

// Decide o formato pela extensão do arquivo.
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, RuntimeError> {
    let contents = std::fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        Ok(toml::from_str(&contents)?)
    } else {
        Ok(serde_json::from_str(&contents)?)
    }
}
