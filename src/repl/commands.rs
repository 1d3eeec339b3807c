//! Slash command handlers for the chat screen
//!
//! Handles /help, /status, /sessions, /resume, /new, /end, /feedback,
//! /people, /policy, /logout, /quit.

use anyhow::Result;
use rustyline::DefaultEditor;
use std::sync::Arc;
use std::time::Instant;

use crate::api::types::{Identity, Person, SessionFeedback};
use crate::api::ApiClient;
use crate::chat::ChatController;
use crate::storage::{self, Storage};

use super::colors;

/// What the chat screen should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Logout,
    Quit,
}

/// Command handler with access to the chat screen's state
pub struct CommandHandler<'a> {
    pub api: &'a ApiClient,
    pub store: &'a Arc<dyn Storage>,
    pub identity: &'a Identity,
    pub controller: &'a ChatController,
    pub ambiente: &'a str,
    pub start_time: Instant,
    pub editor: &'a mut DefaultEditor,
}

impl<'a> CommandHandler<'a> {
    /// Handle a slash command.
    pub async fn handle(&mut self, cmd: &str) -> Result<CommandOutcome> {
        let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
        let command = parts[0];
        let arg = parts.get(1).copied().unwrap_or("").trim();

        match command {
            "/help" => {
                println!("Comandos:");
                println!("  /help              - Mostra esta ajuda");
                println!("  /status            - Estado atual (usuário, sessão, backend)");
                println!("  /sessions          - Lista suas sessões");
                println!("  /resume <id>       - Retoma uma sessão pelo id");
                println!("  /new               - Abre uma nova sessão");
                println!("  /end               - Encerra a sessão atual");
                println!("  /feedback          - Envia feedback sobre a sessão");
                println!("  /people            - Cadastra pessoas importantes");
                println!("  /policy            - Política de privacidade");
                println!("  /logout            - Sai da conta");
                println!("  /quit              - Sai do aplicativo");
            }
            "/status" => {
                self.cmd_status();
            }
            "/sessions" => {
                self.cmd_sessions().await;
            }
            "/resume" => {
                if arg.is_empty() {
                    println!("Uso: /resume <id da sessão>");
                } else {
                    self.controller.bind(arg).await;
                    println!("{}", colors::success(&format!("Sessão {} retomada.", arg)));
                }
            }
            "/new" => {
                self.cmd_new().await;
            }
            "/end" => {
                self.cmd_end().await;
            }
            "/feedback" => {
                self.cmd_feedback().await;
            }
            "/people" => {
                self.cmd_people().await;
            }
            "/policy" => {
                super::print_policy();
            }
            "/logout" => {
                storage::clear_identity(self.store.as_ref());
                println!("Você saiu da conta.");
                return Ok(CommandOutcome::Logout);
            }
            "/quit" | "/exit" => {
                return Ok(CommandOutcome::Quit);
            }
            _ => {
                // The SPA's catch-all route, terminal edition
                println!("Comando desconhecido: {}. Tente /help", command);
            }
        }
        Ok(CommandOutcome::Continue)
    }

    /// /status - Show current state
    fn cmd_status(&self) {
        let state = self.controller.snapshot();
        println!("Usuário:  {} ({})", self.identity.display_name, self.identity.user_id);
        println!(
            "Sessão:   {}",
            state.session_id.as_deref().unwrap_or("(nenhuma)")
        );
        println!("Mensagens: {}", state.messages.len());
        if let Some(error) = &state.error {
            println!("Último erro: {}", error);
        }
        println!("Backend:  {}", self.api.base_url());
        println!("Uptime:   {}", format_duration(self.start_time.elapsed()));
    }

    /// /sessions - List the user's sessions
    async fn cmd_sessions(&self) {
        match self.api.list_sessions(&self.identity.user_id).await {
            Ok(sessions) if sessions.is_empty() => {
                println!("Você ainda não tem sessões registradas.");
                println!("{}", colors::status("Use /new para iniciar uma."));
            }
            Ok(sessions) => {
                println!("{}", colors::header("Suas sessões"));
                for session in sessions {
                    let created = session.criado_em.as_deref().unwrap_or("-");
                    let summary = session.resumo.as_deref().unwrap_or("— sem resumo —");
                    println!("  {}  {}  {}", session.id, colors::status(created), summary);
                    let tags = session.tags_label();
                    if !tags.is_empty() {
                        println!("      {}", colors::status(&format!("Tags: {}", tags)));
                    }
                    if let Some(status) = &session.status {
                        println!("      {}", colors::status(&format!("Status: {}", status)));
                    }
                }
                println!("{}", colors::status("Use /resume <id> para retomar."));
            }
            Err(e) => {
                println!("{}", colors::error(&format!("Falha ao buscar sessões: {}", e)));
            }
        }
    }

    /// /new - Open a fresh session (unconditional create)
    async fn cmd_new(&self) {
        match self.controller.new_session().await {
            Ok(session_id) => {
                println!(
                    "{}",
                    colors::success(&format!("Nova sessão aberta ({}).", session_id))
                );
            }
            Err(e) => {
                println!(
                    "{}",
                    colors::error(&format!("Erro ao abrir nova sessão: {}", e))
                );
            }
        }
    }

    /// /end - Close the current session
    async fn cmd_end(&self) {
        if self.controller.session_id().is_none() {
            println!("Nenhuma sessão aberta.");
            return;
        }
        match self.controller.end_session().await {
            Ok(()) => {
                println!("{}", colors::success("Sessão encerrada com sucesso."));
            }
            Err(e) => {
                println!("{}", colors::error(&format!("Erro ao encerrar sessão: {}", e)));
            }
        }
    }

    /// /feedback - Prompted session feedback form
    async fn cmd_feedback(&mut self) {
        let Some(session_id) = self.controller.session_id() else {
            println!("Nenhuma sessão aberta para avaliar.");
            return;
        };

        println!("{}", colors::header("Ajude a melhorar (leva ~10s)."));
        println!("{}", colors::status("Linha vazia cancela."));

        let Some(tone) = self.read_score("O estilo da conversa combinou com você? (1-10)", 1, 10)
        else {
            println!("Feedback cancelado.");
            return;
        };
        let Some(memory) =
            self.read_score("O app lembrou bem do seu contexto e decisões? (1-10)", 1, 10)
        else {
            println!("Feedback cancelado.");
            return;
        };
        let Some(nps) = self.read_score("Você recomendaria o Mentor Tríade? (0-10)", 0, 10) else {
            println!("Feedback cancelado.");
            return;
        };

        let goal_reached = self
            .read_field("Esta sessão te ajudou a avançar no que queria? (s/n, vazio pula)")
            .and_then(|answer| match answer.to_lowercase().as_str() {
                "s" | "sim" => Some(true),
                "n" | "não" | "nao" => Some(false),
                _ => None,
            });

        let suggestion = self
            .read_field("Se algo te incomodou ou faltou, conta aqui (opcional)")
            .filter(|s| !s.is_empty())
            .map(|s| s.chars().take(1000).collect::<String>());

        let feedback = SessionFeedback {
            user_id: self.identity.user_id.clone(),
            sessao_id: session_id,
            ambiente: self.ambiente.to_lowercase(),
            nota_tom_rapport: tone,
            nota_memoria: memory,
            nps,
            atingiu_objetivo: goal_reached,
            sugestao: suggestion,
            modelo_ai: None,
            versao_app: Some(env!("CARGO_PKG_VERSION").to_string()),
            motivo_gatilho: "intervalo_sessoes".to_string(),
        };

        match self.api.submit_feedback(&feedback).await {
            Ok(()) => println!("{}", colors::success("Feedback enviado. Obrigado!")),
            Err(e) => println!("{}", colors::error(&format!("Falha ao enviar feedback: {}", e))),
        }
    }

    /// /people - Register significant people for the user
    async fn cmd_people(&mut self) {
        println!("{}", colors::header("Cadastro de pessoas importantes"));
        println!("{}", colors::status("Nome vazio encerra a lista."));

        let mut people = Vec::new();
        loop {
            let Some(nome) = self.read_field("Nome") else {
                break;
            };
            if nome.is_empty() {
                break;
            }
            let apelido = self.read_field("Apelido").unwrap_or_default();
            let relacao = self.read_field("Relação").unwrap_or_default();
            let sentimento = self.read_field("Sentimento").unwrap_or_default();
            people.push(Person {
                nome,
                apelido,
                relacao,
                sentimento,
            });
        }

        if people.is_empty() {
            println!("Nada a cadastrar.");
            return;
        }

        match self
            .api
            .register_people(&self.identity.user_id, &people)
            .await
        {
            Ok(()) => println!("{}", colors::success("Pessoas cadastradas com sucesso!")),
            Err(e) => println!(
                "{}",
                colors::error(&format!("Falha ao cadastrar pessoas: {}", e))
            ),
        }
    }

    fn read_field(&mut self, label: &str) -> Option<String> {
        self.editor
            .readline(&format!("{}: ", label))
            .ok()
            .map(|line| line.trim().to_string())
    }

    fn read_score(&mut self, label: &str, min: i32, max: i32) -> Option<i32> {
        loop {
            let answer = self.read_field(label)?;
            if answer.is_empty() {
                return None;
            }
            match answer.parse::<i32>() {
                Ok(value) if (min..=max).contains(&value) => return Some(value),
                _ => println!("Valor inválido, use um número de {} a {}.", min, max),
            }
        }
    }
}

/// Human-friendly duration, e.g. "1h 02m 15s"
fn format_duration(elapsed: std::time::Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
