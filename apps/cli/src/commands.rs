use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use tracing::info;

use chat_cell::{ChatApi, ChatGateway, ChatMessage, HttpChatApi};
use shared_config::AppConfig;
use shared_utils::datetime::localize;
use visit_cell::{
    format_visit_date, HttpVisitApi, LogicalStatus, UpdateVisitRequest, VisitActionDispatcher,
    VisitApi, VisitRequest, VisitStore,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List(Option<LogicalStatus>),
    Upcoming,
    Accept(String),
    Reject(String),
    Cancel(String),
    Delete(String),
    Edit {
        id: String,
        date_visite: String,
        notes: Option<String>,
    },
    Reviews(String),
    Chat(String),
    Send { id: String, text: String },
}

pub const USAGE: &str = "usage: colocation-cli <command>

commands:
  list [pending|accepted|refused|completed]
  upcoming
  accept <id>
  reject <id>
  cancel <id>
  delete <id>
  edit <id> <dateVisite> [notes]
  reviews <id>
  chat <id>
  send <id> <text>";

impl Command {
    pub fn parse(args: &[String]) -> anyhow::Result<Self> {
        let (name, rest) = args.split_first().ok_or_else(|| anyhow!("missing command"))?;
        let id = || -> anyhow::Result<String> {
            rest.first()
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a visit id", name))
        };

        let command = match name.as_str() {
            "list" => {
                let filter = match rest.first() {
                    Some(raw) => Some(parse_status(raw)?),
                    None => None,
                };
                Command::List(filter)
            }
            "upcoming" => Command::Upcoming,
            "accept" => Command::Accept(id()?),
            "reject" => Command::Reject(id()?),
            "cancel" => Command::Cancel(id()?),
            "delete" => Command::Delete(id()?),
            "edit" => Command::Edit {
                id: id()?,
                date_visite: rest
                    .get(1)
                    .cloned()
                    .ok_or_else(|| anyhow!("edit needs a visit date"))?,
                notes: (rest.len() > 2).then(|| rest[2..].join(" ")),
            },
            "reviews" => Command::Reviews(id()?),
            "chat" => Command::Chat(id()?),
            "send" => {
                let id = id()?;
                if rest.len() < 2 {
                    bail!("send needs a message text");
                }
                Command::Send {
                    id,
                    text: rest[1..].join(" "),
                }
            }
            other => bail!("unknown command {:?}", other),
        };
        Ok(command)
    }
}

fn parse_status(raw: &str) -> anyhow::Result<LogicalStatus> {
    LogicalStatus::ALL
        .into_iter()
        .find(|status| status.as_str() == raw.trim().to_lowercase())
        .ok_or_else(|| anyhow!("unknown status filter {:?}", raw))
}

/// Wires the cells from the configuration and runs one command.
pub struct App {
    config: AppConfig,
    dispatcher: VisitActionDispatcher,
    chat_api: Arc<dyn ChatApi>,
}

impl App {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let visit_api: Arc<dyn VisitApi> = Arc::new(HttpVisitApi::new(&config)?);
        let chat_api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(&config)?);
        let store = Arc::new(VisitStore::new(config.visit_cache_ttl()));
        let dispatcher = VisitActionDispatcher::new(visit_api, store, config.session());

        Ok(Self {
            config,
            dispatcher,
            chat_api,
        })
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        info!("Running {:?}", command);

        match command {
            Command::List(filter) => {
                let visits = self.dispatcher.refresh(true).await?;
                visits
                    .iter()
                    .filter(|visit| filter.map_or(true, |status| visit.status == status))
                    .for_each(|visit| self.print_visit(visit));
            }
            Command::Upcoming => {
                self.dispatcher.refresh(false).await?;
                for visit in self.dispatcher.store().upcoming(Utc::now()).await {
                    self.print_visit(&visit);
                }
            }
            Command::Accept(id) => {
                self.dispatcher.refresh(false).await?;
                self.dispatcher.accept(&id).await?;
                self.print_cached(&id).await;
            }
            Command::Reject(id) => {
                self.dispatcher.refresh(false).await?;
                self.dispatcher.reject(&id).await?;
                self.print_cached(&id).await;
            }
            Command::Cancel(id) => {
                self.dispatcher.refresh(false).await?;
                self.dispatcher.cancel(&id).await?;
                self.print_cached(&id).await;
            }
            Command::Delete(id) => {
                self.dispatcher.refresh(false).await?;
                self.dispatcher.delete(&id).await?;
                println!("Visite {} supprimée", id);
            }
            Command::Edit {
                id,
                date_visite,
                notes,
            } => {
                self.dispatcher.refresh(false).await?;
                let request = UpdateVisitRequest {
                    date_visite: Some(date_visite),
                    notes,
                    contact_phone: None,
                };
                self.dispatcher.update(&id, request).await?;
                self.print_cached(&id).await;
            }
            Command::Reviews(id) => {
                self.dispatcher.refresh(false).await?;
                let reviews = self.dispatcher.fetch_reviews(&id).await?;
                if reviews.is_empty() {
                    println!("Aucun avis");
                }
                for review in reviews {
                    println!(
                        "{}/5  {}",
                        review.rating,
                        review.comment.as_deref().unwrap_or_default()
                    );
                }
            }
            Command::Chat(id) => {
                let chat = self.open_chat(&id).await?;
                let messages = chat.refresh().await?;
                for message in messages.iter() {
                    self.print_message(message);
                }
                chat.mark_as_read().await?;
            }
            Command::Send { id, text } => {
                let chat = self.open_chat(&id).await?;
                let message = chat.send(Some(text), Vec::new()).await?;
                self.print_message(&message);
            }
        }
        Ok(())
    }

    async fn open_chat(&self, id: &str) -> anyhow::Result<ChatGateway> {
        self.dispatcher.refresh(false).await?;
        let visit = self
            .dispatcher
            .store()
            .get(id)
            .await
            .with_context(|| format!("visit {} not found", id))?;
        Ok(ChatGateway::open(
            &visit,
            Arc::clone(&self.chat_api),
            self.dispatcher.session().clone(),
        )?)
    }

    async fn print_cached(&self, id: &str) {
        if let Some(visit) = self.dispatcher.store().get(id).await {
            self.print_visit(&visit);
        }
    }

    fn print_visit(&self, visit: &VisitRequest) {
        let date = format_visit_date(visit, self.config.display_utc_offset_minutes)
            .unwrap_or_else(|_| visit.date_visite.clone());
        println!(
            "{:<26} {:<11} {}  {}",
            visit.id.as_deref().unwrap_or("-"),
            visit.status.label(),
            date,
            visit.logement_title.as_deref().unwrap_or(&visit.logement_id)
        );
    }

    fn print_message(&self, message: &ChatMessage) {
        let at = localize(
            &shared_utils::format_wire(message.created_at),
            self.config.display_utc_offset_minutes,
        )
        .unwrap_or_default();
        let marker = if message.is_from(&self.config.user_id) { ">" } else { "<" };
        let images = if message.images.is_empty() {
            String::new()
        } else {
            format!(" [{} image(s)]", message.images.len())
        };
        println!("{} {} {}{}", at, marker, message.text, images);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_list_filter() {
        assert_eq!(Command::parse(&args(&["list"])).unwrap(), Command::List(None));
        assert_eq!(
            Command::parse(&args(&["list", "Accepted"])).unwrap(),
            Command::List(Some(LogicalStatus::Accepted))
        );
        assert!(Command::parse(&args(&["list", "archived"])).is_err());
    }

    #[test]
    fn test_parse_actions_need_id() {
        assert_eq!(
            Command::parse(&args(&["reject", "1"])).unwrap(),
            Command::Reject("1".into())
        );
        assert!(Command::parse(&args(&["accept"])).is_err());
        assert!(Command::parse(&args(&[])).is_err());
        assert!(Command::parse(&args(&["book", "1"])).is_err());
    }

    #[test]
    fn test_parse_edit_and_send_join_text() {
        assert_matches!(
            Command::parse(&args(&["edit", "1", "2030-06-01T14:30:00Z", "après", "16h"])).unwrap(),
            Command::Edit { notes: Some(notes), .. } if notes == "après 16h"
        );
        assert_eq!(
            Command::parse(&args(&["send", "2", "Bonjour", "à", "tous"])).unwrap(),
            Command::Send {
                id: "2".into(),
                text: "Bonjour à tous".into()
            }
        );
        assert!(Command::parse(&args(&["send", "2"])).is_err());
    }
}
