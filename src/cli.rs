//! Interface de linha de comando do stagerun baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, check)
//! e a flag global `--verbose`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use stagerun::ConfigPaths;
use stagerun::orchestrator::PipelineSettings;

/// stagerun: executa pipelines de tarefas dirigidos por máquina de estados.
#[derive(Debug, Parser)]
#[command(name = "stagerun", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Caminhos dos três documentos de configuração.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Definição da máquina de estados (JSON ou TOML).
    #[arg(long, default_value = "config/runtime/state_machine.json")]
    pub state_machine: PathBuf,

    /// Gramática das tarefas (JSON ou TOML).
    #[arg(long, default_value = "config/runtime/task_grammar.json")]
    pub grammar: PathBuf,

    /// Limiares de avaliação, tempo, recursos e erros (JSON ou TOML).
    #[arg(long, default_value = "config/runtime/threshold.json")]
    pub thresholds: PathBuf,
}

impl ConfigArgs {
    pub fn paths(&self) -> ConfigPaths {
        ConfigPaths {
            state_machine: self.state_machine.clone(),
            task_grammar: self.grammar.clone(),
            thresholds: self.thresholds.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa o pipeline até um estado final.
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Prompt entregue à tarefa `generate`.
        #[arg(long, default_value = "test prompt")]
        prompt: String,

        /// Template usado pela tarefa `render`.
        #[arg(long, default_value = "default")]
        template: String,

        /// Destino da tarefa `upload`.
        #[arg(long, default_value = "https://example.com")]
        destination: String,

        /// Nota devolvida pelo avaliador embutido.
        #[arg(long, default_value_t = 1.0)]
        score: f64,

        /// Imprime apenas o registro da execução em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Carrega e valida a configuração sem executar nada.
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Monta as configurações do pipeline a partir dos argumentos de `run`.
pub fn pipeline_settings(prompt: &str, template: &str, destination: &str) -> PipelineSettings {
    PipelineSettings {
        prompt: prompt.to_string(),
        template: template.to_string(),
        destination: destination.to_string(),
        ..PipelineSettings::default()
    }
}
