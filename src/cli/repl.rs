//! Interactive REPL.
//!
//! Reads lines with reedline, dispatches slash commands and sends everything
//! else to the backend. All visible output is published on the message bus
//! and drained by the terminal renderer after each step.

use std::io::IsTerminal;

use futures::StreamExt;
use reedline::Signal;
use tracing::{debug, info, warn};

use super::commands::{show_help, Command};
use super::prompt::{create_reedline, DamayPrompt};
use crate::client::{ApiClient, ChatRequest, DataFilter, DataKind, KnowledgeItem, ProcessKind};
use crate::config::{ChatMode, ClientSettings, XdgDirs};
use crate::messaging::{
    MessageBus, MessageReceiver, MessageSender, Spinner, SpinnerConfig, SpinnerHandle,
    TerminalRenderer,
};
use crate::session::{ChatSession, SessionError};
use crate::stream::{RenderedThought, ThoughtDispatcher};

/// Characters of item content shown in `/data` listings.
const PREVIEW_CHARS: usize = 80;

/// REPL state.
pub struct Repl {
    client: ApiClient,
    settings: ClientSettings,
    chat: ChatSession,
    bus: MessageBus,
    sender: MessageSender,
    receiver: MessageReceiver,
    renderer: TerminalRenderer,
    /// Reasoning trace of the last streamed answer.
    last_log: Vec<RenderedThought>,
    /// Active `/data` filter.
    filter: DataFilter,
}

impl Repl {
    /// Create a new REPL.
    pub fn new(settings: ClientSettings) -> anyhow::Result<Self> {
        let client = ApiClient::new(&settings)?;
        let bus = MessageBus::new();
        let sender = bus.sender();
        let receiver = bus.subscribe();

        Ok(Self {
            client,
            settings,
            chat: ChatSession::new(),
            bus,
            sender,
            receiver,
            renderer: TerminalRenderer::new(),
            last_log: Vec::new(),
            filter: DataFilter::default(),
        })
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn filter(&self) -> DataFilter {
        self.filter
    }

    /// Extra subscription to everything the REPL publishes.
    pub fn subscribe(&self) -> MessageReceiver {
        self.bus.subscribe()
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let dirs = XdgDirs::new();
        let history_path = match dirs.ensure_dirs() {
            Ok(()) => Some(dirs.history_file()),
            Err(e) => {
                warn!(error = %e, "Could not create state directory");
                None
            }
        };
        let mut line_editor = create_reedline(history_path);

        loop {
            let prompt = DamayPrompt::new(self.settings.mode, self.chat.turns().len());

            match line_editor.read_line(&prompt) {
                Ok(Signal::Success(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    match self.handle_input(line).await {
                        Ok(true) => {
                            println!("Sampai jumpa!");
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            self.sender.error(format!("Error: {}", e));
                            self.flush();
                        }
                    }
                }
                Ok(Signal::CtrlC) => {
                    println!("^C");
                    continue;
                }
                Ok(Signal::CtrlD) => {
                    println!("Sampai jumpa!");
                    break;
                }
                Err(err) => {
                    self.sender.error(format!("Readline error: {}", err));
                    self.flush();
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle user input. Returns `true` when the REPL should exit.
    pub async fn handle_input(&mut self, input: &str) -> anyhow::Result<bool> {
        if input.starts_with('/') {
            return self.handle_command(input).await;
        }
        self.ask(input).await?;
        Ok(false)
    }

    /// Handle a slash command.
    async fn handle_command(&mut self, input: &str) -> anyhow::Result<bool> {
        let command = match Command::parse(input) {
            Ok(command) => command,
            Err(e) => {
                self.sender.warning(e.to_string());
                self.flush();
                return Ok(false);
            }
        };
        debug!(?command, "Command");

        if command.requires_admin() && self.settings.mode != ChatMode::Admin {
            self.sender
                .warning(format!("{} is only available in admin mode (--admin)", input));
            self.flush();
            return Ok(false);
        }

        match command {
            Command::Help => show_help(),
            Command::Quit => return Ok(true),
            Command::New => self.new_chat(),
            Command::Regenerate => self.regenerate().await?,
            Command::Remember => self.remember().await,
            Command::Process(kind) => self.run_process(kind).await,
            Command::Data(filter) => self.list_data(filter).await,
            Command::Log => self.show_log(),
        }
        self.flush();
        Ok(false)
    }

    /// Send a question and show the answer.
    pub async fn ask(&mut self, question: &str) -> anyhow::Result<()> {
        self.chat.append_user(question);
        let Some(request) = self.chat.pending_request() else {
            return Ok(());
        };
        self.answer(request).await;
        Ok(())
    }

    async fn answer(&mut self, request: ChatRequest) {
        match self.settings.mode {
            ChatMode::Public => self.answer_public(request).await,
            ChatMode::Admin => self.answer_streamed(request).await,
        }
        self.flush();
    }

    async fn answer_public(&mut self, request: ChatRequest) {
        let spinner = self.spinner("Thinking...");
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let result = tokio::select! {
            result = self.client.chat(&request) => Some(result),
            _ = &mut ctrl_c => None,
        };
        stop(spinner).await;

        match result {
            Some(Ok(answer)) => {
                let session = self.chat.id();
                if let Err(e) = self.chat.append_model(answer.as_str()) {
                    warn!(error = %e, "Answer could not be recorded in history");
                }
                self.sender.answer(session, &answer, self.settings.render);
            }
            Some(Err(e)) => self.sender.error(e.to_string()),
            None => self.sender.warning("Cancelled"),
        }
    }

    /// Consume the thought stream for `request`, publishing each rendered
    /// entry as it arrives.
    async fn answer_streamed(&mut self, request: ChatRequest) {
        let session = self.chat.id();
        let mut dispatcher = ThoughtDispatcher::new(session);
        let mut spinner = self.spinner("Thinking...");
        let render = self.settings.render;
        let client = self.client.clone();

        let stream = match client.stream_thoughts(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                stop(spinner).await;
                let entry = dispatcher.abort(&e.to_string()).clone();
                self.sender.thought(session, &entry);
                self.last_log = dispatcher.into_log();
                return;
            }
        };
        tokio::pin!(stream);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut answered = false;

        loop {
            let item = tokio::select! {
                item = stream.next() => item,
                _ = &mut ctrl_c => {
                    stop(spinner.take()).await;
                    let entry = dispatcher.abort("Cancelled").clone();
                    self.sender.thought(session, &entry);
                    break;
                }
            };
            stop(spinner.take()).await;

            match item {
                Some(Ok(event)) => {
                    let Some(entry) = dispatcher.dispatch(event, &mut self.chat).cloned() else {
                        break;
                    };
                    if entry.step.is_terminal() && !answered {
                        answered = true;
                        if let Some(raw) = dispatcher.final_answer() {
                            self.sender.answer(session, raw, render);
                        }
                    } else {
                        self.sender.thought(session, &entry);
                    }
                }
                Some(Err(e)) => {
                    let entry = dispatcher.abort(&e.to_string()).clone();
                    self.sender.thought(session, &entry);
                    break;
                }
                None => {
                    if let Some(entry) = dispatcher.finish().cloned() {
                        self.sender.thought(session, &entry);
                    }
                    break;
                }
            }
            self.flush();
        }

        info!(session = %session, state = ?dispatcher.state(), entries = dispatcher.log().len(), "Stream closed");
        self.last_log = dispatcher.into_log();
    }

    /// Replace the last answer with a fresh one.
    async fn regenerate(&mut self) -> anyhow::Result<()> {
        let result = match self.settings.mode {
            ChatMode::Public => {
                let spinner = self.spinner("Regenerating...");
                let result = self.chat.regenerate(&self.client).await.map(str::to_string);
                stop(spinner).await;
                result.map(|answer| {
                    self.sender.answer(self.chat.id(), &answer, self.settings.render);
                })
            }
            ChatMode::Admin => match self.chat.prepare_regenerate() {
                Ok(request) => {
                    self.answer_streamed(request).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(()) => Ok(()),
            Err(SessionError::NothingToRegenerate) => {
                self.sender.warning("Nothing to regenerate yet. Ask a question first.");
                Ok(())
            }
            Err(SessionError::Backend(e)) => {
                self.sender.error(format!("Regeneration failed: {}", e));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn new_chat(&mut self) {
        self.chat.reset();
        self.last_log.clear();
        self.sender.success("Started a new conversation");
    }

    /// Save the last question and answer to the backend's memory bank.
    async fn remember(&mut self) {
        let Some((question, answer)) = self
            .chat
            .last_exchange()
            .map(|(q, a)| (q.to_string(), a.to_string()))
        else {
            self.sender.warning("Nothing to remember yet. Get an answer first.");
            return;
        };

        match self.client.save_memory(&question, &answer).await {
            Ok(message) if message.is_empty() => self.sender.success("Saved to memory"),
            Ok(message) => self.sender.success(message),
            Err(e) => self.sender.error(format!("Saving to memory failed: {}", e)),
        }
    }

    /// Run a maintenance job and stream its log.
    async fn run_process(&mut self, kind: ProcessKind) {
        let label = kind.label();
        self.sender.info(format!("{} started", label));
        self.flush();

        let client = self.client.clone();
        let stream = match client.run_process(kind).await {
            Ok(stream) => stream,
            Err(e) => {
                self.sender.process(label, format!("Error: {}", e));
                return;
            }
        };
        tokio::pin!(stream);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            let item = tokio::select! {
                item = stream.next() => item,
                _ = &mut ctrl_c => {
                    self.sender.warning(format!("{} output detached", label));
                    return;
                }
            };
            match item {
                Some(Ok(line)) => self.sender.process(label, line),
                Some(Err(e)) => {
                    self.sender.process(label, format!("Error: {}", e));
                    return;
                }
                None => break,
            }
            self.flush();
        }

        self.sender.success(format!("{} finished", label));
    }

    /// List knowledge items, optionally switching the filter first.
    async fn list_data(&mut self, filter: Option<DataFilter>) {
        if let Some(filter) = filter {
            self.filter = filter;
        }

        let items = match self.client.list_data().await {
            Ok(items) => items,
            Err(e) => {
                self.sender.error(format!("Could not load data: {}", e));
                return;
            }
        };

        let shown = self.filter.apply(&items);
        if shown.is_empty() {
            self.sender.info(format!("No items (filter: {})", self.filter));
            return;
        }

        self.sender.info(format!(
            "{} of {} items (filter: {})",
            shown.len(),
            items.len(),
            self.filter
        ));
        for item in shown {
            self.sender.info(describe_item(item));
        }
    }

    /// Re-print the last reasoning trace under the current session.
    fn show_log(&mut self) {
        if self.last_log.is_empty() {
            self.sender.info("No reasoning trace yet");
            return;
        }
        let session = self.chat.id();
        self.sender.divider();
        for entry in &self.last_log {
            self.sender.thought(session, entry);
        }
        self.sender.divider();
    }

    fn spinner(&self, message: &str) -> Option<SpinnerHandle> {
        std::io::stdout()
            .is_terminal()
            .then(|| {
                Spinner::with_config(SpinnerConfig::for_locale(|key| std::env::var(key).ok()))
                    .start(message)
            })
    }

    /// Render everything queued for the active session.
    fn flush(&mut self) {
        if let Err(e) = self.renderer.drain(&mut self.receiver, self.chat.id()) {
            warn!(error = %e, "Render failed");
        }
    }
}

async fn stop(spinner: Option<SpinnerHandle>) {
    if let Some(spinner) = spinner {
        spinner.stop().await;
    }
}

fn kind_label(kind: DataKind) -> &'static str {
    match kind {
        DataKind::Scraped => "scraped",
        DataKind::Manual => "manual",
        DataKind::Memory => "memory",
        DataKind::Unknown => "other",
    }
}

/// One-line summary of a knowledge item.
pub fn describe_item(item: &KnowledgeItem) -> String {
    let title = item
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("(untitled)");
    let mut line = format!("#{} [{}] {}", item.display_id(), kind_label(item.kind), title);

    if let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) {
        line.push_str(&format!(" <{}>", url));
    }
    if let Some(content) = item.content.as_deref() {
        let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
        if !flat.is_empty() {
            let preview: String = flat.chars().take(PREVIEW_CHARS).collect();
            let ellipsis = if flat.chars().count() > PREVIEW_CHARS { "…" } else { "" };
            line.push_str(&format!(" - {}{}", preview, ellipsis));
        }
    }
    line
}
