//! Interface de terminal do stagerun: spinner e saída colorida.
//!
//! Usa `indicatif` para o spinner e `console` para as cores. O
//! [`RunProgress`] é também um [`Logger`]: cada mensagem do runtime vira a
//! mensagem do spinner e segue para o `tracing`.

use std::error::Error;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use stagerun::RunRecord;
use stagerun::infra::{Logger, TracingLogger};

/// Indicador visual de progresso de uma execução.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Inicia o spinner.
    pub fn start() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("starting");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner com sucesso.
    pub fn complete(&self, record: &RunRecord) {
        self.pb.finish_and_clear();
        println!(
            "  {} Reached {} after {} tasks ({} retries, {} failures)",
            self.green.apply_to("✓"),
            record.final_state,
            record.tasks_executed,
            record.retries,
            record.failures
        );
    }

    /// Finaliza o spinner com erro.
    pub fn abort(&self, err: &dyn Error) {
        self.pb.finish_and_clear();
        println!("  {} Run aborted: {err}", self.red.apply_to("✗"));
    }

    /// Imprime o registro da execução em JSON.
    pub fn print_record(&self, record: &RunRecord) {
        println!();
        println!("{}", self.yellow.apply_to("─── Run Record ───"));
        println!("{}", serde_json::to_string_pretty(record).unwrap_or_default());
    }
}

impl Logger for RunProgress {
    fn info(&self, message: &str) {
        self.pb.set_message(message.to_string());
        TracingLogger.info(message);
    }

    fn error(&self, message: &str, cause: &(dyn Error + 'static)) {
        self.pb
            .println(format!("  {} {message}: {cause}", self.red.apply_to("!")));
        TracingLogger.error(message, cause);
    }
}
