//! Interactive terminal surface
//!
//! The browser build's pages map onto screens of a readline loop: login and
//! registration become prompted flows, the session list and privacy policy
//! become slash commands, and the chat page is the main loop itself. All of
//! it is presentational; session lifecycle and message traffic go through
//! [`SessionResolver`] and [`ChatController`].

pub mod colors;
mod commands;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::api::types::{Identity, RegistrationForm};
use crate::api::ApiClient;
use crate::chat::{ChatController, Message, Origin, SendOutcome};
use crate::session::SessionResolver;
use crate::storage::{self, Storage, KEY_SESSION_ID};

use commands::{CommandHandler, CommandOutcome};

/// Why the chat screen was left.
enum ScreenExit {
    Quit,
    Logout,
}

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    api: ApiClient,
    store: Arc<dyn Storage>,
    /// Feedback environment label ("beta" or "prod")
    ambiente: String,
    /// History file path
    history_path: PathBuf,
    start_time: Instant,
}

impl Repl {
    pub fn new(api: ApiClient, store: Arc<dyn Storage>, ambiente: String) -> Result<Self> {
        let editor = DefaultEditor::new()?;

        let history_path = dirs::home_dir()
            .unwrap_or_default()
            .join(".mentor")
            .join("chat_history");

        Ok(Self {
            editor,
            api,
            store,
            ambiente,
            history_path,
            start_time: Instant::now(),
        })
    }

    /// Load command history
    fn load_history(&mut self) {
        if self.history_path.exists() {
            let _ = self.editor.load_history(&self.history_path);
        }
    }

    /// Save command history
    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = self.editor.save_history(&self.history_path);
    }

    /// Run the screen loop until the user quits.
    ///
    /// `identity` is the stored identity from a previous run, if any;
    /// `session_hint` is the explicit session id from the command line and
    /// takes priority over the persisted one.
    pub async fn run(
        &mut self,
        identity: Option<Identity>,
        session_hint: Option<String>,
    ) -> Result<()> {
        self.load_history();

        let mut identity = identity;
        let mut session_hint = session_hint;

        loop {
            let current = match identity.take() {
                Some(current) => current,
                None => match self.login_screen().await? {
                    Some(current) => current,
                    None => break,
                },
            };

            match self.chat_screen(current, session_hint.take()).await? {
                ScreenExit::Logout => continue,
                ScreenExit::Quit => break,
            }
        }

        self.save_history();
        println!("Até logo!");
        Ok(())
    }

    /// Login screen: email/password prompts plus /register, /policy, /quit.
    async fn login_screen(&mut self) -> Result<Option<Identity>> {
        println!("{}", colors::header("Entrar"));
        println!(
            "{}",
            colors::status("Digite seu e-mail para entrar, ou /register, /policy, /quit")
        );

        loop {
            let Some(line) = self.read_line("e-mail> ") else {
                return Ok(None);
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input {
                "/quit" | "/exit" => return Ok(None),
                "/register" => {
                    self.register_screen().await;
                    continue;
                }
                "/policy" => {
                    print_policy();
                    continue;
                }
                _ if input.starts_with('/') => {
                    println!(
                        "Comando desconhecido: {}. Tente /register, /policy ou /quit",
                        input
                    );
                    continue;
                }
                email => {
                    let Some(senha) = self.read_line("senha> ") else {
                        return Ok(None);
                    };
                    match self.api.login(email, senha.trim()).await {
                        Ok(identity) => {
                            storage::save_identity(self.store.as_ref(), &identity);
                            println!(
                                "{}",
                                colors::success(&format!(
                                    "Bem-vindo(a), {}!",
                                    identity.display_name
                                ))
                            );
                            return Ok(Some(identity));
                        }
                        Err(e) => {
                            println!("{}", colors::error(&format!("Falha no login: {}", e)));
                        }
                    }
                }
            }
        }
    }

    /// Registration screen: prompted form posted to the backend.
    async fn register_screen(&mut self) {
        println!("{}", colors::header("Cadastro"));

        let fields = [
            "Nome",
            "E-mail",
            "Telefone",
            "Telefone de emergência",
            "Senha",
        ];
        let mut answers = Vec::with_capacity(fields.len());
        for field in fields {
            let Some(answer) = self.read_line(&format!("{}: ", field)) else {
                println!("Cadastro cancelado.");
                return;
            };
            answers.push(answer.trim().to_string());
        }

        let answers: [String; 5] = match answers.try_into() {
            Ok(answers) => answers,
            Err(_) => return,
        };
        let [nome, email, telefone, telefone_emergencia, senha] = answers;
        let form = RegistrationForm {
            nome,
            email,
            telefone,
            telefone_emergencia,
            senha,
        };

        match self.api.register(&form).await {
            Ok(()) => {
                println!(
                    "{}",
                    colors::success("Cadastro realizado com sucesso! Você já pode fazer login.")
                );
            }
            Err(e) => {
                println!("{}", colors::error(&format!("Falha no cadastro: {}", e)));
            }
        }
    }

    /// Chat screen: binds (or resolves) a session, then reads messages and
    /// slash commands until logout or quit.
    async fn chat_screen(
        &mut self,
        identity: Identity,
        session_hint: Option<String>,
    ) -> Result<ScreenExit> {
        let controller = ChatController::new(
            self.api.clone(),
            Arc::clone(&self.store),
            identity.user_id.clone(),
        );

        // Session source order: explicit hint > persisted value > resolution
        let known = session_hint.or_else(|| self.store.get(KEY_SESSION_ID));
        match known {
            Some(session_id) => controller.bind(&session_id).await,
            None => {
                let resolver = SessionResolver::new(self.api.clone(), Arc::clone(&self.store));
                match resolver.resolve(&identity.user_id).await {
                    Ok(session_id) => controller.bind(&session_id).await,
                    Err(e) => {
                        // Establishment failures block the chat screen entirely
                        println!(
                            "{}",
                            colors::error(&format!("Erro ao iniciar sessão: {}", e))
                        );
                        return Ok(ScreenExit::Logout);
                    }
                }
            }
        }

        self.print_chat_banner(&identity, &controller);
        let mut rendered = render_new(&controller, &identity, 0);
        if let Some(error) = controller.snapshot().error {
            println!("{}", colors::error(&format!("Erro: {}", error)));
        }

        loop {
            let prompt = colors::prompt();
            let Some(line) = self.read_line(&prompt) else {
                return Ok(ScreenExit::Quit);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let _ = self.editor.add_history_entry(trimmed);

            if trimmed.starts_with('/') {
                let mut handler = CommandHandler {
                    api: &self.api,
                    store: &self.store,
                    identity: &identity,
                    controller: &controller,
                    ambiente: &self.ambiente,
                    start_time: self.start_time,
                    editor: &mut self.editor,
                };
                match handler.handle(trimmed).await? {
                    CommandOutcome::Continue => {
                        rendered = render_new(&controller, &identity, rendered);
                    }
                    CommandOutcome::Logout => return Ok(ScreenExit::Logout),
                    CommandOutcome::Quit => return Ok(ScreenExit::Quit),
                }
                continue;
            }

            let outcome = controller.send(trimmed).await;
            rendered = render_new(&controller, &identity, rendered);
            match outcome {
                SendOutcome::Failed => {
                    if let Some(error) = controller.snapshot().error {
                        println!("{}", colors::error(&format!("Erro: {}", error)));
                    }
                }
                SendOutcome::Rejected if controller.session_id().is_none() => {
                    println!("Nenhuma sessão aberta. Use /new para abrir uma.");
                }
                _ => {}
            }
        }
    }

    fn print_chat_banner(&self, identity: &Identity, controller: &ChatController) {
        println!();
        println!("{}", colors::separator(50));
        println!(
            "{}",
            colors::banner_line("Usuário", &identity.display_name)
        );
        println!(
            "{}",
            colors::banner_line(
                "Sessão",
                controller.session_id().as_deref().unwrap_or("-")
            )
        );
        println!("{}", colors::separator(50));
        println!(
            "{}",
            colors::status("Escreva sua mensagem (Ctrl+D para sair, /help para comandos)")
        );
        println!();
    }

    fn read_line(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Some(line),
            Err(ReadlineError::Interrupted) => Some(String::new()),
            Err(ReadlineError::Eof) => None,
            Err(e) => {
                println!("{}", colors::error(&format!("Erro de leitura: {}", e)));
                None
            }
        }
    }
}

/// Print transcript entries not yet shown; returns the new rendered count.
///
/// A transcript that shrank (new session) is reprinted from the top after a
/// separator.
fn render_new(controller: &ChatController, identity: &Identity, rendered: usize) -> usize {
    let state = controller.snapshot();
    let start = if rendered > state.messages.len() {
        println!("{}", colors::separator(50));
        0
    } else {
        rendered
    };
    for message in &state.messages[start..] {
        print_message(message, &identity.display_name);
    }
    state.messages.len()
}

fn print_message(message: &Message, user_name: &str) {
    let label = colors::speaker(message.origin, user_name);
    match message.origin {
        Origin::System => println!("{}: {}", label, colors::warning(&message.text)),
        _ => println!("{}: {}", label, message.text),
    }
}

/// The privacy policy page, terminal edition.
pub(crate) fn print_policy() {
    println!("{}", colors::header("Política de Privacidade – Mentor Tríade"));
    println!();
    println!("O Mentor Tríade é um sistema em fase beta. Suas conversas são");
    println!("registradas para que você possa acessá-las depois e para melhorar a");
    println!("qualidade do serviço. Durante o beta, trechos anonimizados podem ser");
    println!("revisados para ajustes técnicos; nunca compartilhamos o contexto");
    println!("completo de uma conversa nem a identidade de quem a teve.");
    println!();
    println!("Você pode solicitar acesso, correção ou exclusão dos seus dados a");
    println!("qualquer momento pelo e-mail suporte@mentor360.com.br.");
}
